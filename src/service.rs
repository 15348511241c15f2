// SPDX-License-Identifier: GPL-3.0-only
//! Brightness read/write service
//!
//! Everything the public API promises about validation, multi-monitor
//! fan-out and result aggregation lives here. The service sees displays only
//! through [`Discovery`] and [`DisplayProtocol`], so the native layer stays
//! a black box.
//!
//! Every call works on a fresh enumeration snapshot; nothing is shared
//! between calls. Writes are validated before any native dispatch: one
//! unknown monitor id or out-of-range value fails the whole call without
//! touching hardware. Valid assignments then fan out on the blocking pool
//! and are all awaited before the aggregate result is shaped.

use std::sync::{Arc, Mutex};

use futures::future;
use tokio::task;
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::{
    BrightnessConfiguration, DisplayId, GetBrightnessResult, Monitor, MonitorTarget,
    SetBrightnessResult,
};
use crate::protocols::DisplayProtocol;

/// Display handle shared with blocking tasks; locked only on the blocking
/// pool, never across an await point
pub(crate) type SharedDisplay = Arc<Mutex<Box<dyn DisplayProtocol>>>;

/// One enumerated monitor with the protocol handle that drives it
#[derive(Clone)]
pub(crate) struct AttachedDisplay {
    pub monitor: Monitor,
    pub handle: SharedDisplay,
}

/// Source of the per-call enumeration snapshot
pub(crate) trait Discovery {
    fn discover(&self) -> Result<Vec<AttachedDisplay>>;
}

pub(crate) struct BrightnessService<D> {
    discovery: D,
}

impl<D: Discovery> BrightnessService<D> {
    pub(crate) fn new(discovery: D) -> Self {
        Self { discovery }
    }

    /// Snapshot of the currently attached monitors
    pub(crate) fn monitors(&self) -> Result<Vec<Monitor>> {
        Ok(self
            .discovery
            .discover()?
            .into_iter()
            .map(|display| display.monitor)
            .collect())
    }

    /// Read brightness from one monitor, or from the default monitor when
    /// no id is given.
    ///
    /// Unknown ids and native read failures resolve into the unsuccessful
    /// result; only discovery or task-join faults return `Err`.
    pub(crate) async fn get(&self, monitor_id: Option<&str>) -> Result<GetBrightnessResult> {
        let displays = self.discovery.discover()?;
        let display = match monitor_id {
            Some(id) => displays.iter().find(|display| display.monitor.id == id),
            None => default_display(&displays),
        };
        let Some(display) = display else {
            return Ok(GetBrightnessResult::failed());
        };

        let id = display.monitor.id.clone();
        let handle = Arc::clone(&display.handle);
        let outcome = task::spawn_blocking(move || handle.lock().unwrap().get_brightness())
            .await
            .map_err(|err| Error::TaskJoin(err.to_string()))?;

        match outcome {
            // Quirky hardware occasionally reports raw values past 100;
            // clamp so the result invariant holds
            Ok(value) => Ok(GetBrightnessResult::ok(value.min(100))),
            Err(err) => {
                warn!("brightness read failed on {id}: {err:#}");
                Ok(GetBrightnessResult::failed())
            }
        }
    }

    /// Apply a normalized list of (target, value) assignments.
    ///
    /// All-or-nothing validation, then best-effort dispatch: every valid
    /// assignment is attempted exactly once and the aggregate succeeds only
    /// if all writes did. The first failure in dispatch order names the
    /// diagnostic.
    pub(crate) async fn set(
        &self,
        assignments: Vec<(MonitorTarget, u16)>,
    ) -> Result<SetBrightnessResult> {
        if let Some((_, value)) = assignments.iter().find(|(_, value)| *value > 100) {
            return Ok(SetBrightnessResult::failed(format!(
                "brightness {value} is out of range (0-100)"
            )));
        }

        let displays = self.discovery.discover()?;
        let mut writes: Vec<(SharedDisplay, DisplayId, u16)> = Vec::new();
        for (target, value) in assignments {
            match target {
                MonitorTarget::All => {
                    for display in &displays {
                        writes.push((
                            Arc::clone(&display.handle),
                            display.monitor.id.clone(),
                            value,
                        ));
                    }
                }
                MonitorTarget::Primary => match default_display(&displays) {
                    Some(display) => writes.push((
                        Arc::clone(&display.handle),
                        display.monitor.id.clone(),
                        value,
                    )),
                    None => return Ok(SetBrightnessResult::failed("no monitors available")),
                },
                MonitorTarget::Id(id) => {
                    match displays.iter().find(|display| display.monitor.id == id) {
                        Some(display) => {
                            writes.push((Arc::clone(&display.handle), id, value));
                        }
                        None => {
                            return Ok(SetBrightnessResult::failed(format!(
                                "monitor not found: {id}"
                            )));
                        }
                    }
                }
            }
        }

        let attempts: Vec<_> = writes
            .into_iter()
            .map(|(handle, id, value)| {
                task::spawn_blocking(move || {
                    handle
                        .lock()
                        .unwrap()
                        .set_brightness(value)
                        .map_err(|err| (id, err))
                })
            })
            .collect();

        let mut failure = None;
        for settled in future::join_all(attempts).await {
            match settled.map_err(|err| Error::TaskJoin(err.to_string()))? {
                Ok(()) => {}
                Err((id, err)) => {
                    warn!("failed to set brightness on {id}: {err:#}");
                    if failure.is_none() {
                        failure = Some(format!("failed to set brightness on {id}: {err}"));
                    }
                }
            }
        }

        Ok(match failure {
            Some(message) => SetBrightnessResult::failed(message),
            None => SetBrightnessResult::ok(),
        })
    }
}

/// Default monitor: the first internal panel in enumeration order, else the
/// first monitor overall. Enumeration order is deterministic, so this is too.
fn default_display(displays: &[AttachedDisplay]) -> Option<&AttachedDisplay> {
    displays
        .iter()
        .find(|display| display.monitor.internal)
        .or_else(|| displays.first())
}

/// Normalize a configuration mapping into assignment pairs, sorted by
/// monitor id so validation and failure reporting stay deterministic.
pub(crate) fn config_assignments(config: &BrightnessConfiguration) -> Vec<(MonitorTarget, u16)> {
    let mut entries: Vec<_> = config.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .into_iter()
        .map(|(id, value)| (MonitorTarget::Id(id.clone()), *value))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU16, Ordering};

    use anyhow::anyhow;

    use super::*;
    use crate::model::{GLOBAL, Position, Size};

    #[derive(Debug)]
    struct FakeDisplay {
        id: String,
        value: Arc<AtomicU16>,
        writes: Arc<Mutex<Vec<u16>>>,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl DisplayProtocol for FakeDisplay {
        fn id(&self) -> String {
            self.id.clone()
        }

        fn name(&self) -> String {
            format!("Fake {}", self.id)
        }

        fn get_brightness(&mut self) -> anyhow::Result<u16> {
            if self.fail_reads {
                return Err(anyhow!("read rejected"));
            }
            Ok(self.value.load(Ordering::SeqCst))
        }

        fn set_brightness(&mut self, value: u16) -> anyhow::Result<()> {
            // Record the attempt even when failing, so tests can assert
            // that every assignment was dispatched
            self.writes.lock().unwrap().push(value);
            if self.fail_writes {
                return Err(anyhow!("write rejected"));
            }
            self.value.store(value, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fake {
        display: AttachedDisplay,
        value: Arc<AtomicU16>,
        writes: Arc<Mutex<Vec<u16>>>,
    }

    fn fake(id: &str, internal: bool, value: u16) -> Fake {
        fake_with(id, internal, value, false, false)
    }

    fn fake_with(id: &str, internal: bool, value: u16, fail_reads: bool, fail_writes: bool) -> Fake {
        let value = Arc::new(AtomicU16::new(value));
        let writes = Arc::new(Mutex::new(Vec::new()));
        let display = FakeDisplay {
            id: id.to_string(),
            value: Arc::clone(&value),
            writes: Arc::clone(&writes),
            fail_reads,
            fail_writes,
        };
        let monitor = Monitor {
            id: id.to_string(),
            display_id: format!("DP-{id}"),
            name: format!("Fake {id}"),
            manufacturer: "DEL".to_string(),
            serial_number: format!("{id}-0001"),
            product_code: "40A2".to_string(),
            internal,
            size: Size {
                width: 2560,
                height: 1440,
            },
            position: Position::default(),
        };
        Fake {
            display: AttachedDisplay {
                monitor,
                handle: Arc::new(Mutex::new(Box::new(display) as Box<dyn DisplayProtocol>)),
            },
            value,
            writes,
        }
    }

    struct FakeDiscovery {
        displays: Vec<AttachedDisplay>,
        fail: bool,
    }

    impl Discovery for FakeDiscovery {
        fn discover(&self) -> Result<Vec<AttachedDisplay>> {
            if self.fail {
                return Err(Error::Enumeration("probe crashed".to_string()));
            }
            Ok(self.displays.clone())
        }
    }

    fn service(fakes: &[&Fake]) -> BrightnessService<FakeDiscovery> {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        BrightnessService::new(FakeDiscovery {
            displays: fakes.iter().map(|fake| fake.display.clone()).collect(),
            fail: false,
        })
    }

    #[test]
    fn monitors_lists_every_attached_display() {
        let a = fake("a", true, 50);
        let b = fake("b", false, 50);
        let monitors = service(&[&a, &b]).monitors().unwrap();
        assert_eq!(monitors.len(), 2);
        assert_eq!(monitors[0].id, "a");
        assert!(monitors[0].internal);
        assert_eq!(monitors[1].id, "b");
    }

    #[tokio::test]
    async fn get_reads_brightness_by_id() {
        let a = fake("a", false, 73);
        let result = service(&[&a]).get(Some("a")).await.unwrap();
        assert_eq!(result, GetBrightnessResult::ok(73));
    }

    #[tokio::test]
    async fn get_unknown_id_resolves_unsuccessfully() {
        let a = fake("a", false, 73);
        let result = service(&[&a]).get(Some("nonexistent-id")).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.brightness, None);
    }

    #[tokio::test]
    async fn get_with_no_monitors_resolves_unsuccessfully() {
        let result = service(&[]).get(None).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn get_recovers_native_read_failures() {
        let a = fake_with("a", false, 73, true, false);
        let result = service(&[&a]).get(Some("a")).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.brightness, None);
    }

    #[tokio::test]
    async fn get_clamps_hardware_values_past_full() {
        let a = fake("a", false, 180);
        let result = service(&[&a]).get(Some("a")).await.unwrap();
        assert_eq!(result.brightness, Some(100));
    }

    #[tokio::test]
    async fn get_defaults_to_the_internal_panel() {
        let external = fake("a", false, 30);
        let internal = fake("b", true, 60);
        // The internal panel is not first, it must still win
        let result = service(&[&external, &internal]).get(None).await.unwrap();
        assert_eq!(result.brightness, Some(60));
    }

    #[tokio::test]
    async fn get_defaults_to_first_monitor_without_internal_panel() {
        let a = fake("a", false, 30);
        let b = fake("b", false, 60);
        let result = service(&[&a, &b]).get(None).await.unwrap();
        assert_eq!(result.brightness, Some(30));
    }

    #[tokio::test]
    async fn get_default_selection_is_deterministic() {
        let a = fake("a", false, 30);
        let b = fake("b", true, 60);
        let service = service(&[&a, &b]);
        let first = service.get(None).await.unwrap();
        let second = service.get(None).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn discovery_failure_rejects_instead_of_resolving() {
        let service = BrightnessService::new(FakeDiscovery {
            displays: Vec::new(),
            fail: true,
        });
        assert!(matches!(
            service.get(None).await,
            Err(Error::Enumeration(_))
        ));
        assert!(matches!(
            service.set(vec![(MonitorTarget::Primary, 50)]).await,
            Err(Error::Enumeration(_))
        ));
    }

    #[tokio::test]
    async fn set_writes_the_named_monitor() {
        let a = fake("a", false, 10);
        let b = fake("b", false, 10);
        let result = service(&[&a, &b])
            .set(vec![(MonitorTarget::Id("b".to_string()), 85)])
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.message, None);
        assert_eq!(b.value.load(Ordering::SeqCst), 85);
        assert!(a.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_primary_targets_the_default_monitor() {
        let external = fake("a", false, 10);
        let internal = fake("b", true, 10);
        let result = service(&[&external, &internal])
            .set(vec![(MonitorTarget::Primary, 40)])
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(internal.value.load(Ordering::SeqCst), 40);
        assert!(external.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_global_fans_out_to_every_monitor() {
        let a = fake("a", true, 10);
        let b = fake("b", false, 20);
        let result = service(&[&a, &b]).set(vec![(GLOBAL, 65)]).await.unwrap();
        assert!(result.success);
        assert_eq!(a.value.load(Ordering::SeqCst), 65);
        assert_eq!(b.value.load(Ordering::SeqCst), 65);
    }

    #[tokio::test]
    async fn set_global_without_monitors_is_vacuously_successful() {
        let result = service(&[]).set(vec![(GLOBAL, 65)]).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn set_primary_without_monitors_fails() {
        let result = service(&[])
            .set(vec![(MonitorTarget::Primary, 65)])
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.message.is_some());
    }

    #[tokio::test]
    async fn set_unknown_id_fails_without_touching_hardware() {
        let a = fake("a", false, 10);
        let result = service(&[&a])
            .set(vec![(MonitorTarget::Id("nonexistent-id".to_string()), 50)])
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.message.is_some());
        assert!(a.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_config_applies_each_assignment() {
        let a = fake("a", true, 50);
        let b = fake("b", false, 50);
        let service = service(&[&a, &b]);

        let config = HashMap::from([("a".to_string(), 10), ("b".to_string(), 20)]);
        let result = service.set(config_assignments(&config)).await.unwrap();
        assert!(result.success);

        let read_a = service.get(Some("a")).await.unwrap();
        let read_b = service.get(Some("b")).await.unwrap();
        assert_eq!(read_a.brightness, Some(10));
        assert_eq!(read_b.brightness, Some(20));
    }

    #[tokio::test]
    async fn set_config_with_one_unknown_id_applies_nothing() {
        let a = fake("a", true, 50);
        let b = fake("b", false, 50);
        let config = HashMap::from([
            ("a".to_string(), 10),
            ("b".to_string(), 20),
            ("z".to_string(), 30),
        ]);
        let result = service(&[&a, &b])
            .set(config_assignments(&config))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(a.writes.lock().unwrap().is_empty());
        assert!(b.writes.lock().unwrap().is_empty());
        assert_eq!(a.value.load(Ordering::SeqCst), 50);
        assert_eq!(b.value.load(Ordering::SeqCst), 50);
    }

    #[tokio::test]
    async fn set_rejects_out_of_range_values_before_dispatch() {
        let a = fake("a", false, 50);
        let result = service(&[&a])
            .set(vec![(MonitorTarget::Id("a".to_string()), 101)])
            .await
            .unwrap();
        assert!(!result.success);
        assert!(a.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_attempts_every_assignment_despite_failures() {
        let broken = fake_with("flaky", false, 10, false, true);
        let healthy = fake("steady", false, 10);
        let result = service(&[&broken, &healthy])
            .set(vec![(GLOBAL, 70)])
            .await
            .unwrap();

        // The healthy sibling is still written, then the aggregate reports
        // the first failure in dispatch order
        assert!(!result.success);
        assert_eq!(healthy.value.load(Ordering::SeqCst), 70);
        assert_eq!(broken.writes.lock().unwrap().as_slice(), &[70]);
        assert!(result.message.unwrap().contains("flaky"));
    }

    #[tokio::test]
    async fn set_then_restore_round_trips() {
        let a = fake("a", false, 77);
        let service = service(&[&a]);

        let original = service.get(Some("a")).await.unwrap().brightness.unwrap();
        let dimmed = service
            .set(vec![(MonitorTarget::Id("a".to_string()), 30)])
            .await
            .unwrap();
        assert!(dimmed.success);

        let restored = service
            .set(vec![(MonitorTarget::Id("a".to_string()), original)])
            .await
            .unwrap();
        assert!(restored.success);
        assert_eq!(
            service.get(Some("a")).await.unwrap().brightness,
            Some(77)
        );
    }

    #[test]
    fn config_assignments_are_sorted_by_monitor_id() {
        let config = HashMap::from([
            ("c".to_string(), 30),
            ("a".to_string(), 10),
            ("b".to_string(), 20),
        ]);
        let assignments = config_assignments(&config);
        let ids: Vec<String> = assignments
            .iter()
            .map(|(target, _)| target.to_string())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }
}
