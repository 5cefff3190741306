use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Food category a user can ask for.
///
/// Each category fans out into a fixed table of Korean sub-query phrases,
/// because the local search API returns at most five results per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Korean,
    Chinese,
    Japanese,
    Western,
    Snacks,
    Cafe,
    Fastfood,
    Latenight,
}

const KOREAN_QUERIES: &[&str] = &[
    "한식 맛집",
    "국밥",
    "삼겹살",
    "김치찌개",
    "된장찌개",
    "냉면",
    "갈비",
    "보쌈",
    "족발",
    "칼국수",
    "비빔밥",
    "순두부",
    "감자탕",
    "백반",
    "닭갈비",
    "곰탕",
    "불고기",
    "쌈밥",
    "부대찌개",
    "해장국",
    "찜닭",
    "한정식",
];

const CHINESE_QUERIES: &[&str] = &[
    "중식 맛집",
    "짜장면",
    "짬뽕",
    "탕수육",
    "마라탕",
    "양꼬치",
    "딤섬",
    "중국집",
    "마라샹궈",
    "훠궈",
];

const JAPANESE_QUERIES: &[&str] = &[
    "일식 맛집",
    "초밥",
    "라멘",
    "돈카츠",
    "우동",
    "오마카세",
    "이자카야",
    "덮밥",
    "소바",
    "텐동",
    "규카츠",
    "스시",
];

const WESTERN_QUERIES: &[&str] = &[
    "양식 맛집",
    "파스타",
    "스테이크",
    "피자",
    "햄버거",
    "브런치",
    "리조또",
    "수제버거",
    "비스트로",
    "레스토랑",
];

const SNACKS_QUERIES: &[&str] = &[
    "분식 맛집",
    "떡볶이",
    "김밥",
    "순대",
    "라볶이",
    "튀김",
    "쫄면",
    "만두",
];

const CAFE_QUERIES: &[&str] = &[
    "카페 디저트",
    "카페",
    "디저트",
    "베이커리",
    "케이크",
    "빙수",
    "브런치카페",
];

const FASTFOOD_QUERIES: &[&str] = &[
    "패스트푸드",
    "햄버거",
    "치킨",
    "샌드위치",
    "핫도그",
    "토스트",
];

const LATENIGHT_QUERIES: &[&str] = &[
    "야식 맛집",
    "치킨",
    "족발",
    "보쌈",
    "곱창",
    "닭발",
    "포차",
    "막창",
    "술집",
];

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Korean,
        Category::Chinese,
        Category::Japanese,
        Category::Western,
        Category::Snacks,
        Category::Cafe,
        Category::Fastfood,
        Category::Latenight,
    ];

    /// Stable key used in requests and as the geo cache partition.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Korean => "korean",
            Category::Chinese => "chinese",
            Category::Japanese => "japanese",
            Category::Western => "western",
            Category::Snacks => "snacks",
            Category::Cafe => "cafe",
            Category::Fastfood => "fastfood",
            Category::Latenight => "latenight",
        }
    }

    /// Sub-query phrases, broadest first.
    pub fn sub_queries(&self) -> &'static [&'static str] {
        match self {
            Category::Korean => KOREAN_QUERIES,
            Category::Chinese => CHINESE_QUERIES,
            Category::Japanese => JAPANESE_QUERIES,
            Category::Western => WESTERN_QUERIES,
            Category::Snacks => SNACKS_QUERIES,
            Category::Cafe => CAFE_QUERIES,
            Category::Fastfood => FASTFOOD_QUERIES,
            Category::Latenight => LATENIGHT_QUERIES,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.key() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}
