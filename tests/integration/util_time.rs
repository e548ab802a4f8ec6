use chrono::{FixedOffset, TimeZone};
use docmatch::util::time::report_file_name;

#[test]
fn uses_wall_clock_of_the_given_offset() {
    let offset = FixedOffset::east_opt(9 * 3600).expect("valid offset");
    let now = offset
        .with_ymd_and_hms(2026, 2, 23, 23, 59, 59)
        .single()
        .expect("valid timestamp");
    assert_eq!(
        report_file_name(&now),
        "validation_results_20260223_235959.csv"
    );
}
