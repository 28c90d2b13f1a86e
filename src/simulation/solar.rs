//! # Solar Plant Simulation
//!
//! Synthetic hourly records of a multi-inverter PV plant: per-inverter energy,
//! global horizontal and tilted irradiance, and air temperature. Production
//! follows a clear-sky radiation model with persistent cloud cover, so the
//! series has the diurnal and seasonal structure the feature pipeline targets.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::info;
use validator::Validate;

use crate::domain::TimeSeries;
use crate::error::Result;

/// Extraterrestrial irradiance in W/m²
const SOLAR_CONSTANT: f64 = 1367.0;

/// Sky state held for a few hours at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloudCover {
    Clear,
    PartlyCloudy,
    MostlyCloudy,
    Overcast,
}

impl CloudCover {
    /// Share of clear-sky irradiance reaching the ground
    pub fn transmission_factor(&self) -> f64 {
        match self {
            Self::Clear => 1.0,
            Self::PartlyCloudy => 0.7,
            Self::MostlyCloudy => 0.4,
            Self::Overcast => 0.15,
        }
    }

    /// Draw a sky state; clear and partly cloudy skies cover about 70% of hours
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let roll: u8 = rng.gen_range(0..100);
        if roll <= 40 {
            Self::Clear
        } else if roll <= 70 {
            Self::PartlyCloudy
        } else if roll <= 85 {
            Self::MostlyCloudy
        } else {
            Self::Overcast
        }
    }
}

/// Clear-sky irradiance at a fixed site
///
/// Solar position from declination and hour angle, attenuated by a simple
/// air-mass transmittance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearSkyModel {
    latitude_deg: f64,
    longitude_deg: f64,
    /// Local clock offset from UTC in hours
    utc_offset_hours: i32,
}

impl ClearSkyModel {
    pub fn new(latitude_deg: f64, longitude_deg: f64, utc_offset_hours: i32) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            utc_offset_hours,
        }
    }

    /// `(elevation, azimuth)` in degrees for a local timestamp. Azimuth is
    /// measured clockwise from north.
    pub fn solar_position(&self, time: NaiveDateTime) -> (f64, f64) {
        let day_of_year = f64::from(time.ordinal());
        let hour = f64::from(time.hour()) + f64::from(time.minute()) / 60.0;

        // ±23.45° at the solstices
        let declination =
            (23.45 * ((day_of_year + 284.0) * 360.0 / 365.0).to_radians().sin()).to_radians();
        let (sin_dec, cos_dec) = declination.sin_cos();
        let (sin_lat, cos_lat) = self.latitude_deg.to_radians().sin_cos();

        let solar_time = hour + self.longitude_deg / 15.0 - f64::from(self.utc_offset_hours);
        let hour_angle_deg = 15.0 * (solar_time - 12.0);

        let elevation = (sin_lat * sin_dec + cos_lat * cos_dec * hour_angle_deg.to_radians().cos())
            .clamp(-1.0, 1.0)
            .asin();
        let azimuth_deg = ((sin_dec - sin_lat * elevation.sin()) / (cos_lat * elevation.cos()))
            .clamp(-1.0, 1.0)
            .acos()
            .to_degrees();

        // Mirror into the western half after solar noon
        let azimuth_deg = if hour_angle_deg > 0.0 {
            360.0 - azimuth_deg
        } else {
            azimuth_deg
        };

        (elevation.to_degrees(), azimuth_deg)
    }

    /// Clear-sky global horizontal irradiance in W/m²
    pub fn clear_sky_irradiance(&self, time: NaiveDateTime) -> f64 {
        let (elevation_deg, _) = self.solar_position(time);
        if elevation_deg <= 0.0 {
            return 0.0;
        }
        let elevation_rad = elevation_deg.to_radians();

        // Relative air mass, linear below 5° where 1/sin diverges
        let air_mass = match elevation_deg {
            e if e > 5.0 => 1.0 / elevation_rad.sin(),
            e => 12.0 - e / 5.0,
        };
        SOLAR_CONSTANT * 0.7_f64.powf(air_mass.powf(0.678)) * elevation_rad.sin()
    }

    /// Ratio of plane-of-array to horizontal irradiance for a panel tilted
    /// `tilt_deg` towards the equator
    pub fn tilt_factor(&self, time: NaiveDateTime, tilt_deg: f64) -> f64 {
        let (elevation_deg, azimuth_deg) = self.solar_position(time);
        if elevation_deg <= 0.0 {
            return 0.0;
        }
        let panel_azimuth_deg = if self.latitude_deg < 0.0 { 0.0 } else { 180.0 };
        let (elevation, tilt) = (elevation_deg.to_radians(), tilt_deg.to_radians());

        let incidence_cos = elevation.sin() * tilt.cos()
            + elevation.cos() * tilt.sin() * (azimuth_deg - panel_azimuth_deg).to_radians().cos();
        (incidence_cos.max(0.0) / elevation.sin()).min(2.0)
    }
}

/// Synthetic plant configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PlantSimulatorConfig {
    /// First simulated day
    pub start: NaiveDate,
    #[validate(range(min = 1, max = 3660))]
    pub days: u32,
    #[validate(range(min = 1, max = 64))]
    pub inverters: usize,
    /// Nameplate capacity of each inverter in kW
    #[validate(range(min = 0.0))]
    pub inverter_capacity_kw: f64,
    /// Fraction of panel output delivered after losses
    #[validate(range(min = 0.0, max = 1.0))]
    pub system_efficiency: f64,
    /// Site latitude, north positive
    pub latitude_deg: f64,
    /// Site longitude, east positive
    pub longitude_deg: f64,
    /// Local clock offset from UTC in hours
    pub utc_offset_hours: i32,
    #[validate(range(min = 0.0, max = 90.0))]
    pub tilt_deg: f64,
    /// Mean daily air temperature in °C
    pub mean_temperature_c: f64,
    /// Draw persistent cloud cover; off gives clear skies every day
    pub enable_clouds: bool,
    /// Chance that an inverter reading is lost
    #[validate(range(min = 0.0, max = 1.0))]
    pub dropout_probability: f64,
    /// Seed of the weather, jitter and dropout draws
    pub random_seed: u64,
}

impl Default for PlantSimulatorConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            days: 90,
            inverters: 4,
            inverter_capacity_kw: 250.0,
            system_efficiency: 0.85,
            latitude_deg: -15.99, // Brasília
            longitude_deg: -48.04,
            utc_offset_hours: -3,
            tilt_deg: 16.0,
            mean_temperature_c: 22.0,
            enable_clouds: true,
            dropout_probability: 0.01,
            random_seed: 42,
        }
    }
}

/// Column names of the generated energy readings, `inverter_1..=n`
pub fn inverter_columns(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("inverter_{}", i)).collect()
}

/// Deterministic hourly plant simulator
pub struct SolarPlantSimulator {
    config: PlantSimulatorConfig,
    clear_sky_model: ClearSkyModel,
    rng: StdRng,
    cloud_cover: CloudCover,
    /// Hours left before the sky state is redrawn
    cloud_hours_left: i64,
}

impl SolarPlantSimulator {
    pub fn new(config: PlantSimulatorConfig) -> Self {
        let clear_sky_model = ClearSkyModel::new(
            config.latitude_deg,
            config.longitude_deg,
            config.utc_offset_hours,
        );
        let rng = StdRng::seed_from_u64(config.random_seed);

        Self {
            config,
            clear_sky_model,
            rng,
            cloud_cover: CloudCover::Clear,
            cloud_hours_left: 0,
        }
    }

    fn update_cloud_cover(&mut self) {
        if !self.config.enable_clouds {
            return;
        }
        self.cloud_hours_left -= 1;
        if self.cloud_hours_left <= 0 {
            self.cloud_cover = CloudCover::random(&mut self.rng);
            self.cloud_hours_left = self.rng.gen_range(1..=6);
        }
    }

    /// Air temperature: daily swing peaking mid-afternoon plus radiative heating
    fn air_temperature(&mut self, time: NaiveDateTime, ghi: f64) -> f64 {
        let hour = time.hour() as f64;
        let diurnal = 5.0 * (2.0 * PI * (hour - 9.0) / 24.0).sin();
        let noise = self.rng.gen_range(-0.5..0.5);
        self.config.mean_temperature_c + diurnal + 3.0 * ghi / 1000.0 + noise
    }

    /// One sample: ([inverter energies], ghi, gti, air_temp)
    fn sample(&mut self, time: NaiveDateTime) -> (Vec<Option<f64>>, f64, f64, f64) {
        self.update_cloud_cover();
        let cloud_factor = self.cloud_cover.transmission_factor();

        let ghi = self.clear_sky_model.clear_sky_irradiance(time) * cloud_factor;
        let gti = ghi * self.clear_sky_model.tilt_factor(time, self.config.tilt_deg);
        let air_temp = self.air_temperature(time, ghi);

        // PV cell runs ~25°C above ambient at 800 W/m²
        let cell_temperature = air_temp + gti / 800.0 * 25.0;
        let thermal_derate = (1.0 - 0.004 * (cell_temperature - 25.0)).clamp(0.0, 1.1);
        let base_kwh = gti / 1000.0
            * self.config.inverter_capacity_kw
            * self.config.system_efficiency
            * thermal_derate;

        let energies = (0..self.config.inverters)
            .map(|_| {
                let jitter = self.rng.gen_range(0.97..1.03);
                let lost = self.rng.gen_bool(self.config.dropout_probability);
                (!lost).then(|| (base_kwh * jitter).max(0.0))
            })
            .collect();

        (energies, ghi, gti, air_temp)
    }

    /// Generate the configured number of days at hourly resolution
    pub fn generate(&mut self) -> Result<TimeSeries> {
        let start = self.config.start.and_time(chrono::NaiveTime::MIN);
        let hours = i64::from(self.config.days) * 24;
        let index: Vec<NaiveDateTime> = (0..hours).map(|h| start + Duration::hours(h)).collect();

        let names = inverter_columns(self.config.inverters);
        let mut energy: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(index.len()); names.len()];
        let mut ghi = Vec::with_capacity(index.len());
        let mut gti = Vec::with_capacity(index.len());
        let mut air_temp = Vec::with_capacity(index.len());

        for time in &index {
            let (energies, g, t, a) = self.sample(*time);
            for (column, value) in energy.iter_mut().zip(energies) {
                column.push(value);
            }
            ghi.push(Some(g));
            gti.push(Some(t));
            air_temp.push(Some(a));
        }

        let mut columns: Vec<(String, Vec<Option<f64>>)> = names.into_iter().zip(energy).collect();
        columns.push(("ghi".to_string(), ghi));
        columns.push(("gti".to_string(), gti));
        columns.push(("air_temp".to_string(), air_temp));

        let series = TimeSeries::from_columns(index, columns)?;
        info!(
            rows = series.len(),
            inverters = self.config.inverters,
            seed = self.config.random_seed,
            "generated synthetic plant"
        );
        Ok(series)
    }
}
