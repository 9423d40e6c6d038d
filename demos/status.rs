use ecotwin::api::status::StatusApi;
use ecotwin::EcoTwinApi;

fn main() {
    let api = EcoTwinApi::from_env_values();

    let status_api = StatusApi::new(&api);

    let all = status_api
        .all_twins_status()
        .expect("Failed to fetch statuses");
    for twin in all {
        println!("twin: {}", twin);
    }
}
