//! Feature synthesis for model inference
//!
//! Every model family was trained on its own feature set. Each set is
//! described here as an ordered table of derivation rules, so the scale
//! divisors and category codes live in one place and adding a family means
//! adding a table.

use self::Category as C;
use self::Derivation as D;
use self::NumericField as N;
use crate::models::Dtype::{Float64 as F64, Int64 as I64, Text as TXT};
use crate::models::{Column, Dtype, FeatureValue, FeatureVector, ModelFamily, RawInput};

/// Divisor mapping num_lanes onto [0, 1]
pub const LANES_DIVISOR: f64 = 8.0;

/// Divisor mapping speed_limit onto [0, 1]
pub const SPEED_DIVISOR: f64 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    NumLanes,
    Curvature,
    SpeedLimit,
    NumReportedAccidents,
}

impl NumericField {
    fn read(self, raw: &RawInput) -> f64 {
        match self {
            NumericField::NumLanes => raw.num_lanes as f64,
            NumericField::Curvature => raw.curvature,
            NumericField::SpeedLimit => raw.speed_limit as f64,
            NumericField::NumReportedAccidents => raw.num_reported_accidents as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolField {
    RoadSignsPresent,
    PublicRoad,
    Holiday,
    SchoolSeason,
}

impl BoolField {
    fn read(self, raw: &RawInput) -> bool {
        match self {
            BoolField::RoadSignsPresent => raw.road_signs_present,
            BoolField::PublicRoad => raw.public_road,
            BoolField::Holiday => raw.holiday,
            BoolField::SchoolSeason => raw.school_season,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    RoadType,
    Lighting,
    Weather,
    TimeOfDay,
}

impl Category {
    fn code(self, raw: &RawInput) -> u8 {
        match self {
            Category::RoadType => raw.road_type.code(),
            Category::Lighting => raw.lighting.code(),
            Category::Weather => raw.weather.code(),
            Category::TimeOfDay => raw.time_of_day.code(),
        }
    }

    fn label(self, raw: &RawInput) -> &'static str {
        match self {
            Category::RoadType => raw.road_type.as_str(),
            Category::Lighting => raw.lighting.as_str(),
            Category::Weather => raw.weather.as_str(),
            Category::TimeOfDay => raw.time_of_day.as_str(),
        }
    }
}

/// How a single feature is computed from the raw input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Derivation {
    Raw(NumericField),
    Log1p(NumericField),
    Ratio(NumericField, f64),
    Flag(BoolField),
    /// 1 when the category currently holds the given label
    OneHot(Category, &'static str),
    Code(Category),
    Label(Category),
    /// curvature * speed_limit / divisor
    CurvatureSpeed(f64),
    /// curvature when lighting is night, else 0
    CurvatureNight,
}

impl Derivation {
    fn evaluate(self, raw: &RawInput) -> FeatureValue {
        let number = match self {
            Derivation::Raw(field) => field.read(raw),
            Derivation::Log1p(field) => field.read(raw).ln_1p(),
            Derivation::Ratio(field, divisor) => field.read(raw) / divisor,
            Derivation::Flag(field) => indicator(field.read(raw)),
            Derivation::OneHot(category, label) => indicator(category.label(raw) == label),
            Derivation::Code(category) => category.code(raw) as f64,
            Derivation::Label(category) => {
                return FeatureValue::Text(category.label(raw).to_string())
            }
            Derivation::CurvatureSpeed(divisor) => raw.curvature * (raw.speed_limit as f64 / divisor),
            Derivation::CurvatureNight => raw.curvature * indicator(raw.is_night()),
        };
        FeatureValue::Number(number)
    }
}

fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRule {
    pub name: &'static str,
    pub derivation: Derivation,
    pub dtype: Dtype,
}

const fn rule(name: &'static str, derivation: Derivation, dtype: Dtype) -> FeatureRule {
    FeatureRule {
        name,
        derivation,
        dtype,
    }
}

const LINEAR_REGRESSION: &[FeatureRule] = &[
    rule("num_reported_accidents_log_scaled", D::Log1p(N::NumReportedAccidents), F64),
    rule("num_lanes_enc_scaled", D::Ratio(N::NumLanes, LANES_DIVISOR), F64),
    rule("speed_limit_enc_scaled", D::Ratio(N::SpeedLimit, SPEED_DIVISOR), F64),
    rule("holiday", D::Flag(BoolField::Holiday), I64),
    rule("public_road", D::Flag(BoolField::PublicRoad), I64),
    rule("road_signs_present", D::Flag(BoolField::RoadSignsPresent), I64),
    rule("school_season", D::Flag(BoolField::SchoolSeason), I64),
    rule("road_type_highway", D::OneHot(C::RoadType, "highway"), I64),
    rule("road_type_rural", D::OneHot(C::RoadType, "rural"), I64),
    rule("road_type_urban", D::OneHot(C::RoadType, "urban"), I64),
    rule("weather_clear", D::OneHot(C::Weather, "clear"), I64),
    rule("weather_foggy", D::OneHot(C::Weather, "foggy"), I64),
    rule("weather_rainy", D::OneHot(C::Weather, "rainy"), I64),
    rule("time_of_day_afternoon", D::OneHot(C::TimeOfDay, "afternoon"), I64),
    rule("time_of_day_evening", D::OneHot(C::TimeOfDay, "evening"), I64),
    rule("time_of_day_morning", D::OneHot(C::TimeOfDay, "morning"), I64),
    rule("curvature_speed_scaled", D::CurvatureSpeed(SPEED_DIVISOR), F64),
    rule("curvature_night_scaled", D::CurvatureNight, F64),
];

/// Shared by lasso and ridge
const SPARSE_LINEAR: &[FeatureRule] = &[
    rule("num_reported_accidents_log_scaled", D::Log1p(N::NumReportedAccidents), F64),
    rule("num_lanes_enc_scaled", D::Ratio(N::NumLanes, LANES_DIVISOR), F64),
    rule("speed_limit_enc_scaled", D::Ratio(N::SpeedLimit, SPEED_DIVISOR), F64),
    rule("public_road", D::Flag(BoolField::PublicRoad), I64),
    rule("road_signs_present", D::Flag(BoolField::RoadSignsPresent), I64),
    rule("weather_clear", D::OneHot(C::Weather, "clear"), I64),
    rule("weather_rainy", D::OneHot(C::Weather, "rainy"), I64),
    rule("time_of_day_evening", D::OneHot(C::TimeOfDay, "evening"), I64),
    rule("curvature_speed_scaled", D::CurvatureSpeed(SPEED_DIVISOR), F64),
    rule("curvature_night_scaled", D::CurvatureNight, F64),
];

const RANDOM_FOREST: &[FeatureRule] = &[
    rule("curvature_speed", D::CurvatureSpeed(1.0), F64),
    rule("curvature_night", D::CurvatureNight, F64),
    rule("speed_limit_enc", D::Ratio(N::SpeedLimit, SPEED_DIVISOR), F64),
    rule("curvature", D::Raw(N::Curvature), F64),
    rule("weather_clear", D::OneHot(C::Weather, "clear"), I64),
    rule("lighting_night", D::OneHot(C::Lighting, "night"), I64),
    rule("num_reported_accidents", D::Raw(N::NumReportedAccidents), I64),
];

const XGBOOST: &[FeatureRule] = &[
    rule("curvature_speed", D::CurvatureSpeed(1.0), F64),
    rule("curvature_night", D::CurvatureNight, F64),
    rule("lighting", D::Code(C::Lighting), F64),
    rule("speed_limit_enc", D::Ratio(N::SpeedLimit, SPEED_DIVISOR), F64),
    rule("weather", D::Code(C::Weather), F64),
    rule("curvature", D::Raw(N::Curvature), F64),
    rule("num_reported_accidents", D::Raw(N::NumReportedAccidents), F64),
];

const LIGHTGBM: &[FeatureRule] = &[
    rule("curvature", D::Raw(N::Curvature), F64),
    rule("curvature_speed", D::CurvatureSpeed(1.0), F64),
    rule("weather", D::Code(C::Weather), I64),
    rule("speed_limit", D::Raw(N::SpeedLimit), I64),
    rule("num_reported_accidents", D::Raw(N::NumReportedAccidents), I64),
    rule("curvature_night", D::CurvatureNight, F64),
    rule("lighting", D::Code(C::Lighting), I64),
    rule("public_road", D::Flag(BoolField::PublicRoad), I64),
    rule("holiday", D::Flag(BoolField::Holiday), I64),
    rule("num_lanes", D::Raw(N::NumLanes), I64),
    rule("time_of_day", D::Code(C::TimeOfDay), I64),
    rule("road_type", D::Code(C::RoadType), I64),
    rule("road_signs_present", D::Flag(BoolField::RoadSignsPresent), I64),
    rule("school_season", D::Flag(BoolField::SchoolSeason), I64),
];

/// Identity copy of the raw input with booleans as 0/1
const PASSTHROUGH: &[FeatureRule] = &[
    rule("road_type", D::Label(C::RoadType), TXT),
    rule("num_lanes", D::Raw(N::NumLanes), I64),
    rule("curvature", D::Raw(N::Curvature), F64),
    rule("speed_limit", D::Raw(N::SpeedLimit), I64),
    rule("lighting", D::Label(C::Lighting), TXT),
    rule("weather", D::Label(C::Weather), TXT),
    rule("road_signs_present", D::Flag(BoolField::RoadSignsPresent), I64),
    rule("public_road", D::Flag(BoolField::PublicRoad), I64),
    rule("time_of_day", D::Label(C::TimeOfDay), TXT),
    rule("holiday", D::Flag(BoolField::Holiday), I64),
    rule("school_season", D::Flag(BoolField::SchoolSeason), I64),
    rule("num_reported_accidents", D::Raw(N::NumReportedAccidents), I64),
];

/// Ordered derivation table for a model family
pub fn recipe(family: ModelFamily) -> &'static [FeatureRule] {
    match family {
        ModelFamily::LinearRegression => LINEAR_REGRESSION,
        ModelFamily::Lasso | ModelFamily::Ridge => SPARSE_LINEAR,
        ModelFamily::RandomForest => RANDOM_FOREST,
        ModelFamily::Xgboost => XGBOOST,
        ModelFamily::Lightgbm => LIGHTGBM,
        ModelFamily::Unknown => PASSTHROUGH,
    }
}

/// Maps one raw input to the named features a model family was trained on
pub fn synthesize(raw: &RawInput, family: ModelFamily) -> FeatureVector {
    let columns = recipe(family)
        .iter()
        .map(|rule| Column::new(rule.name, rule.derivation.evaluate(raw), rule.dtype))
        .collect();
    FeatureVector::from_columns(columns)
}
