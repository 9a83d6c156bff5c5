pub const FALLBACK_TAG: &str = "other";

pub const TEMPLE_TAG: &str = "temple";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRule {
    pub keyword: &'static str,
    pub tag: &'static str,
}

const fn rule(keyword: &'static str, tag: &'static str) -> TagRule {
    TagRule { keyword, tag }
}

/// Keyword rules in priority order. Single-label classification returns the
/// tag of the first rule whose keyword occurs in the text, so entry order is
/// significant: longer or more specific keywords sit ahead of the generic
/// ones they contain.
pub const INTEREST_RULES: &[TagRule] = &[
    rule("觀光工廠", "creative_park"),
    rule("工廠", "creative_park"),
    rule("酒廠", "creative_park"),
    rule("文創", "creative_park"),
    rule("園區", "creative_park"),
    rule("夜市", "night_market"),
    rule("商圈", "department_store"),
    rule("水族館", "aquarium"),
    rule("海生館", "aquarium"),
    rule("博物館", "museum"),
    rule("美術館", "museum"),
    rule("文化館", "museum"),
    rule("展覽館", "museum"),
    rule("音樂廳", "concert_hall"),
    rule("演藝", "concert_hall"),
    rule("藝文中心", "concert_hall"),
    rule("電影院", "cinema"),
    rule("影城", "cinema"),
    rule("遊樂園", "amusement"),
    rule("主題樂園", "amusement"),
    rule("動物園", "zoo"),
    rule("野生動物", "zoo"),
    rule("咖啡", "cafe"),
    rule("餐廳", "restaurant"),
    rule("美食", "restaurant"),
    rule("餐飲", "restaurant"),
    rule("小吃", "street_food"),
    rule("路邊攤", "street_food"),
    rule("小吃街", "street_food"),
    rule("百貨", "department_store"),
    rule("商場", "department_store"),
    rule("購物", "department_store"),
    rule("手作", "handcraft_shop"),
    rule("工藝", "handcraft_shop"),
    rule("陶藝", "handcraft_shop"),
    rule("農場", "farm"),
    rule("牧場", "farm"),
    rule("休閒農場", "farm"),
    rule("露營", "camping"),
    rule("野營", "camping"),
    rule("自行車", "bike"),
    rule("腳踏車", "bike"),
    rule("單車", "bike"),
    rule("水上活動", "water_sport"),
    rule("潛水", "water_sport"),
    rule("戲水", "water_sport"),
    rule("衝浪", "water_sport"),
    rule("划船", "water_sport"),
    rule("球場", "ball_sport"),
    rule("球類", "ball_sport"),
    rule("溫泉", "hot_spring"),
    rule("湯屋", "hot_spring"),
    rule("瀑布", "waterfall"),
    rule("海灘", "beach"),
    rule("沙灘", "beach"),
    rule("海水浴場", "beach"),
    rule("海岸", "beach"),
    rule("湖", "lake_river"),
    rule("河", "lake_river"),
    rule("溪", "lake_river"),
    rule("潟湖", "lake_river"),
    rule("水庫", "lake_river"),
    rule("古厝", "heritage"),
    rule("古蹟", "heritage"),
    rule("老街", "heritage"),
    rule("歷史", "heritage"),
    rule("文化", "heritage"),
    rule("砲台", "heritage"),
    rule("城堡", "heritage"),
    rule("城門", "heritage"),
    rule("城牆", "heritage"),
    rule("故居", "heritage"),
    rule("紀念館", "heritage"),
    rule("自然", "national_park"),
    rule("生態", "national_park"),
    rule("山", "national_park"),
    rule("步道", "national_park"),
    rule("森林", "national_park"),
    rule("森林遊樂區", "national_park"),
    rule("風景區", "national_park"),
    rule("濕地", "national_park"),
    rule("宗教", TEMPLE_TAG),
];

pub const RELIGIOUS_MARKERS: &[&str] = &["廟", "寺", "宮"];

/// Suppresses the religious-site rule: company names often carry 宮 or 寺.
pub const COMPANY_MARKER: &str = "公司";

pub const PLACE_TYPE_TAGS: &[(&str, &str)] = &[
    ("museum", "museum"),
    ("art_gallery", "museum"),
    ("amusement_park", "amusement"),
    ("aquarium", "aquarium"),
    ("zoo", "zoo"),
    ("park", "national_park"),
    ("campground", "camping"),
    ("shopping_mall", "department_store"),
    ("restaurant", "restaurant"),
    ("cafe", "cafe"),
    ("tourist_attraction", "heritage"),
    ("place_of_worship", TEMPLE_TAG),
];

pub const CITY_HINTS: &[&str] = &[
    "台北市",
    "新北市",
    "基隆市",
    "桃園市",
    "新竹市",
    "新竹縣",
    "苗栗縣",
    "台中市",
    "彰化縣",
    "南投縣",
    "雲林縣",
    "嘉義市",
    "嘉義縣",
    "台南市",
    "高雄市",
    "屏東縣",
    "宜蘭縣",
    "花蓮縣",
    "台東縣",
    "澎湖縣",
    "金門縣",
    "連江縣",
];

pub fn multi_label_rules() -> impl Iterator<Item = TagRule> {
    INTEREST_RULES.iter().copied().chain(
        RELIGIOUS_MARKERS
            .iter()
            .map(|&marker| rule(marker, TEMPLE_TAG)),
    )
}

pub fn tag_for_place_type(place_type: &str) -> Option<&'static str> {
    PLACE_TYPE_TAGS
        .iter()
        .find(|(code, _)| *code == place_type)
        .map(|(_, tag)| *tag)
}

pub fn extract_city(address: &str) -> &'static str {
    CITY_HINTS
        .iter()
        .find(|hint| address.contains(*hint))
        .copied()
        .unwrap_or("")
}
