use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

use super::CaptureError;

fn held_devices() -> &'static Mutex<HashSet<String>> {
    static HELD: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    HELD.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Exclusive claim on a capture device for the lifetime of the value.
#[derive(Debug)]
pub struct DeviceLease {
    device_id: String,
}

impl DeviceLease {
    pub fn claim(device_id: &str) -> Result<Self, CaptureError> {
        let mut held = held_devices()
            .lock()
            .map_err(|_| CaptureError::Io("device lease table poisoned".to_string()))?;
        if !held.insert(device_id.to_string()) {
            return Err(CaptureError::DeviceUnavailable(format!(
                "{} is held by another session",
                device_id
            )));
        }
        Ok(Self {
            device_id: device_id.to_string(),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        if let Ok(mut held) = held_devices().lock() {
            held.remove(&self.device_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_fails_until_first_is_dropped() {
        let first = DeviceLease::claim("stub://lease-test").unwrap();
        assert!(matches!(
            DeviceLease::claim("stub://lease-test"),
            Err(CaptureError::DeviceUnavailable(_))
        ));
        drop(first);
        let again = DeviceLease::claim("stub://lease-test").unwrap();
        assert_eq!(again.device_id(), "stub://lease-test");
    }
}
