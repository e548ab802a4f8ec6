use chrono::{DateTime, Local, TimeZone};

/// `validation_results_YYYYMMDD_HHMMSS.csv` for the given instant.
pub fn report_file_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("validation_results_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

pub fn default_report_file_name() -> String {
    report_file_name(&Local::now())
}
