//! Camera drivers
//!
//! ## Responsibilities
//!
//! - `Actuator` capability: the only four things the tracker asks of a camera
//! - Brand registry mapping a brand name to a driver constructor
//! - Bounded retry of each actuator call (callers only see the final outcome)

mod digest_auth;
mod onvif;
mod yushi;

#[cfg(test)]
pub(crate) mod mock;

pub use digest_auth::{DigestChallenge, DigestClient};
pub use onvif::OnvifPtzClient;
pub use yushi::YushiLapiClient;

use crate::error::{Error, Result};
use crate::ptz_controller::{AimCommand, PtzPose};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Attempts per actuator call
pub const MAX_ATTEMPTS: u32 = 3;

/// Per-request HTTP timeout for camera drivers
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Vendor-neutral camera capability
pub trait Actuator: Send + Sync {
    /// Current absolute pose
    fn get_pose(&self) -> BoxFuture<'_, Result<PtzPose>>;

    /// Absolute move; `None` axes are left unchanged
    fn set_pose(&self, command: AimCommand) -> BoxFuture<'_, Result<()>>;

    /// Move to a stored preset
    fn goto_preset(&self, preset: u64) -> BoxFuture<'_, Result<()>>;

    /// JPEG snapshot of the current view
    fn snapshot(&self) -> BoxFuture<'_, Result<Vec<u8>>>;
}

/// Everything a driver needs to reach one camera
#[derive(Debug, Clone)]
pub struct DriverContext {
    /// Camera serial, used in logs and errors
    pub camera: String,
    /// Host[:port] or full endpoint URL
    pub addr: String,
    pub username: String,
    pub password: String,
    /// Largest zoom ratio the profile allows
    pub max_zoom: f64,
}

/// Builds a driver for one camera
pub type DriverConstructor = fn(&DriverContext) -> Result<Arc<dyn Actuator>>;

/// Brand name -> driver constructor
pub struct DriverRegistry {
    constructors: HashMap<String, DriverConstructor>,
}

impl DriverRegistry {
    /// Registry without any driver
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with the drivers shipped in this crate
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::empty();
        registry.register("yushi", YushiLapiClient::construct);
        registry.register("onvif", OnvifPtzClient::construct);
        registry.register("tapo", OnvifPtzClient::construct);
        registry.register("vigi", OnvifPtzClient::construct);
        registry
    }

    /// Register (or replace) the constructor for a brand
    pub fn register(&mut self, brand: &str, constructor: DriverConstructor) {
        self.constructors.insert(brand.to_lowercase(), constructor);
    }

    pub fn contains(&self, brand: &str) -> bool {
        self.constructors.contains_key(&brand.to_lowercase())
    }

    /// Registered brand names, sorted
    pub fn brands(&self) -> Vec<String> {
        let mut brands: Vec<String> = self.constructors.keys().cloned().collect();
        brands.sort();
        brands
    }

    /// Construct the driver for `brand`
    pub fn build(&self, brand: &str, ctx: &DriverContext) -> Result<Arc<dyn Actuator>> {
        let constructor = self
            .constructors
            .get(&brand.to_lowercase())
            .ok_or_else(|| Error::UnknownBrand(brand.to_string()))?;
        constructor(ctx)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_builtin_drivers()
    }
}

/// Run `op` up to [`MAX_ATTEMPTS`] times, returning the first success
pub(crate) async fn with_retries<T, F, Fut>(camera: &str, action: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = Error::actuator(camera, format!("{} not attempted", action));

    for attempt in 1..=MAX_ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(
                    camera = %camera,
                    action = %action,
                    attempt,
                    error = %e,
                    "Camera request failed"
                );
                last_error = e;
            }
        }
    }

    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ctx() -> DriverContext {
        DriverContext {
            camera: "cam1".to_string(),
            addr: "192.168.1.20".to_string(),
            username: "admin".to_string(),
            password: "pw".to_string(),
            max_zoom: 20.0,
        }
    }

    #[test]
    fn test_builtin_brands_case_insensitive() {
        let registry = DriverRegistry::with_builtin_drivers();
        assert!(registry.contains("YuShi"));
        assert!(registry.contains("TAPO"));
        assert!(registry.build("YuShi", &ctx()).is_ok());
        assert!(registry.build("Onvif", &ctx()).is_ok());
    }

    #[test]
    fn test_unknown_brand() {
        let registry = DriverRegistry::with_builtin_drivers();
        let err = registry.build("acme", &ctx()).err().unwrap();
        assert!(matches!(err, Error::UnknownBrand(b) if b == "acme"));
    }

    #[test]
    fn test_register_custom_brand() {
        fn build_mock(_: &DriverContext) -> Result<Arc<dyn Actuator>> {
            Ok(Arc::new(mock::RecordingActuator::new()))
        }

        let mut registry = DriverRegistry::empty();
        assert!(registry.brands().is_empty());
        registry.register("Bench", build_mock);
        assert_eq!(registry.brands(), vec!["bench".to_string()]);
        assert!(registry.build("bench", &ctx()).is_ok());
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retries("cam1", "get pose", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::Network("down".to_string()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_give_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries("cam1", "get pose", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Network("down".to_string()))
        })
        .await;
        assert!(matches!(result, Err(Error::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
