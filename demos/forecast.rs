use std::collections::BTreeMap;

use ecotwin::api::forecast::{Forecast, ForecastApi, DEFAULT_INTERVAL};
use ecotwin::EcoTwinApi;

fn main() {
    let api = EcoTwinApi::from_env_values();

    // Flat 21 °C heat pump setpoint for the next 24 hours
    let mut values = BTreeMap::new();
    values.insert("heat_pump_setpoint".to_string(), vec![21.0; 288]);

    let forecast =
        Forecast::new("my-project", values, DEFAULT_INTERVAL).expect("Invalid forecast");
    println!("{}", forecast.as_polars_df().unwrap());

    let forecast_api = ForecastApi::new(&api);
    let reply = forecast_api.put("my-twin", &forecast, true);
    println!("reply: {:?}", reply);
}
