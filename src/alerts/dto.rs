use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AlertSettingsRequest {
    pub bp_min_systolic: i32,
    pub bp_max_systolic: i32,
    pub bp_min_diastolic: i32,
    pub bp_max_diastolic: i32,
    pub fasting_sugar_min: f64,
    pub fasting_sugar_max: f64,
    pub after_meal_sugar_min: f64,
    pub after_meal_sugar_max: f64,
    #[serde(default)]
    pub emergency_contacts: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}
