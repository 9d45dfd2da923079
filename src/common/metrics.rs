use metrics::counter;

/// Error/Reliability Metrics - Success/Failure pairs
pub fn increment_garmin_api_success() {
    counter!("garmin_api_total", "result" => "success").increment(1);
}

pub fn increment_garmin_api_failure() {
    counter!("garmin_api_total", "result" => "failure").increment(1);
}

pub fn increment_ido_api_success() {
    counter!("ido_api_total", "result" => "success").increment(1);
}

pub fn increment_ido_api_failure(stage: &'static str) {
    counter!("ido_api_total", "result" => "failure", "stage" => stage).increment(1);
}

/// Business Logic Metrics
pub fn increment_activities_synced() {
    counter!("activities_synced_total", "result" => "success").increment(1);
}

pub fn increment_activities_failed(kind: &'static str) {
    counter!("activities_synced_total", "result" => "failure", "kind" => kind).increment(1);
}

pub fn increment_activities_unmapped_type() {
    counter!("activities_unmapped_type_total").increment(1);
}
