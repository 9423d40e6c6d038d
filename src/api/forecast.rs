use std::collections::BTreeMap;

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ApiClient;

use super::ToEpochSeconds;

/// Seconds between two setpoints unless the caller says otherwise.
pub const DEFAULT_INTERVAL: u32 = 300;

const FULL_DAY_SECS: u32 = 86_400;

/// An ECO Forecast payload: one value sequence per VirtualIO, covering at
/// least 24 hours starting at `header.start_t`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Forecast {
    pub header: ForecastHeader,
    pub timeseries: Timeseries,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ForecastHeader {
    #[serde(rename = "projectId")]
    pub project_id: String,

    /// Seconds between two consecutive setpoints
    pub interval: u32,

    /// Epoch second of the first setpoint
    pub start_t: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Timeseries {
    pub y: BTreeMap<String, Vec<f64>>,

    /// Reserved by the API, always empty on the client side
    pub n: BTreeMap<String, Vec<f64>>,
}

impl Forecast {
    /// Builds a forecast stamped with the current UTC time. Every VirtualIO
    /// must carry enough setpoints to span a full day at the given interval.
    pub fn new(
        project_id: &str,
        virtual_io_values: BTreeMap<String, Vec<f64>>,
        interval: u32,
    ) -> Result<Self, anyhow::Error> {
        if interval == 0 {
            bail!("interval must be a positive number of seconds");
        }

        let min_length = FULL_DAY_SECS.div_ceil(interval) as usize;
        for (io_name, values) in &virtual_io_values {
            if values.len() < min_length {
                bail!(
                    "VirtualIO {} must have at least {} values",
                    io_name,
                    min_length
                );
            }
        }

        Ok(Forecast {
            header: ForecastHeader {
                project_id: project_id.to_string(),
                interval,
                start_t: Utc::now().to_epoch_seconds(),
            },
            timeseries: Timeseries {
                y: virtual_io_values,
                n: BTreeMap::new(),
            },
        })
    }

    /// Re-stamps the forecast to start at the given instant instead of "now".
    pub fn with_start_t(mut self, start: DateTime<Utc>) -> Self {
        self.header.start_t = start.to_epoch_seconds();
        self
    }

    pub fn as_polars_df(&self) -> Result<polars::prelude::DataFrame, anyhow::Error> {
        let rows = self.timeseries.y.values().map(Vec::len).max().unwrap_or(0);

        let mut instants: Vec<NaiveDateTime> = Vec::with_capacity(rows);
        for k in 0..rows {
            let t = self.header.start_t + k as i64 * i64::from(self.header.interval);
            let instant = DateTime::from_timestamp(t, 0)
                .with_context(|| format!("setpoint instant {} out of range", t))?;
            instants.push(instant.naive_utc());
        }

        let mut series = vec![Series::new("t".into(), instants)];
        for (io_name, values) in &self.timeseries.y {
            // Shorter channels are padded with nulls up to the longest one
            let mut padded: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
            padded.resize(rows, None);
            series.push(Series::new(io_name.as_str().into(), padded));
        }

        let df = DataFrame::new(series)?;

        Ok(df)
    }
}

pub struct ForecastApi<'a> {
    client: &'a dyn ApiClient,
}

impl<'a> ForecastApi<'a> {
    pub fn new(client: &'a dyn ApiClient) -> Self {
        Self { client }
    }

    /// Pushes the forecast to the twin's external forecast slot. With `check`
    /// the server validates the payload before accepting it.
    pub fn put(
        &self,
        eco_twin_id: &str,
        forecast: &Forecast,
        check: bool,
    ) -> Result<String, anyhow::Error> {
        let mut path = format!("/twins/{}/forecast/external", eco_twin_id);
        if check {
            path.push_str("?check");
        }

        let body = serde_json::to_string(forecast)?;

        self.client.http_put(&path, &body)
    }
}
