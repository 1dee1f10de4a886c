//! Fakes shared by the builder integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use isoforge::driver::{DiskSpec, Driver};
use isoforge::guest::{Communicator, GuestConnector, RemoteOutput};
use isoforge::vnc::KeyboardChannel;
use isoforge::{BuildConfig, BuildError, BuildResult, RawConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Driver that simulates VMware in memory, recording every call.
#[derive(Default)]
pub struct FakeDriver {
    pub calls: Mutex<Vec<String>>,
    pub running: Arc<AtomicBool>,
    pub keys: Arc<Mutex<Vec<(u32, bool)>>>,
    /// Call name that fails, e.g. "start".
    pub fail_on: Option<&'static str>,
    /// Call name that never returns once recorded.
    pub hang_on: Option<&'static str>,
    pub verify_error: Option<&'static str>,
    pub guest_reachable: bool,
}

impl FakeDriver {
    pub fn reachable() -> Self {
        Self {
            guest_reachable: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) -> BuildResult<()> {
        self.calls.lock().unwrap().push(call.to_string());
        if self.fail_on == Some(call) {
            return Err(BuildError::Driver(format!("{} failed", call)));
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for FakeDriver {
    fn name(&self) -> &str {
        "fake"
    }

    async fn verify(&self) -> BuildResult<()> {
        match self.verify_error {
            Some(msg) => Err(BuildError::Driver(msg.to_string())),
            None => Ok(()),
        }
    }

    async fn create_disk(&self, path: &Path, _spec: &DiskSpec) -> BuildResult<()> {
        self.record("create_disk")?;
        std::fs::write(path, b"")?;
        Ok(())
    }

    async fn start(&self, _vmx: &Path, _headless: bool) -> BuildResult<()> {
        self.record("start")?;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self, _vmx: &Path) -> BuildResult<()> {
        self.record("stop")?;
        if self.hang_on == Some("stop") {
            std::future::pending::<()>().await;
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn kill(&self, _vmx: &Path) -> BuildResult<()> {
        self.record("kill")?;
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_running(&self, _vmx: &Path) -> BuildResult<bool> {
        Ok(self.running.load(Ordering::SeqCst))
    }

    async fn guest_ip(&self, _vmx: &Path) -> BuildResult<Option<IpAddr>> {
        Ok(self
            .guest_reachable
            .then_some(IpAddr::V4(Ipv4Addr::LOCALHOST)))
    }

    async fn host_ip(&self) -> BuildResult<IpAddr> {
        Ok(IpAddr::V4(Ipv4Addr::new(10, 0, 2, 2)))
    }

    async fn keyboard(&self, _vnc_port: u16) -> BuildResult<Box<dyn KeyboardChannel>> {
        self.record("keyboard")?;
        if self.hang_on == Some("keyboard") {
            std::future::pending::<()>().await;
        }
        Ok(Box::new(RecordingKeyboard {
            keys: Arc::clone(&self.keys),
        }))
    }
}

pub struct RecordingKeyboard {
    keys: Arc<Mutex<Vec<(u32, bool)>>>,
}

#[async_trait]
impl KeyboardChannel for RecordingKeyboard {
    async fn key_event(&mut self, keysym: u32, down: bool) -> BuildResult<()> {
        self.keys.lock().unwrap().push((keysym, down));
        Ok(())
    }
}

/// Guest that accepts every command. `power_off_on` stops the fake VM.
pub struct FakeGuest {
    pub addr: Mutex<Option<SocketAddr>>,
    pub commands: Mutex<Vec<String>>,
    pub running: Arc<AtomicBool>,
    pub power_off_on: Option<&'static str>,
}

impl FakeGuest {
    pub fn new(running: Arc<AtomicBool>, power_off_on: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            addr: Mutex::new(None),
            commands: Mutex::new(Vec::new()),
            running,
            power_off_on,
        })
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

struct FakeSession {
    guest: Arc<FakeGuest>,
    addr: SocketAddr,
}

#[async_trait]
impl Communicator for FakeSession {
    async fn run(&self, command: &str) -> BuildResult<RemoteOutput> {
        self.guest.commands.lock().unwrap().push(command.to_string());
        if self.guest.power_off_on == Some(command) {
            self.guest.running.store(false, Ordering::SeqCst);
        }
        Ok(RemoteOutput {
            exit_code: Some(0),
            ..RemoteOutput::default()
        })
    }

    fn address(&self) -> SocketAddr {
        self.addr
    }
}

pub struct FakeConnector(pub Arc<FakeGuest>);

#[async_trait]
impl GuestConnector for FakeConnector {
    async fn connect(
        &self,
        addr: SocketAddr,
        _config: &BuildConfig,
    ) -> BuildResult<Arc<dyn Communicator>> {
        *self.0.addr.lock().unwrap() = Some(addr);
        Ok(Arc::new(FakeSession {
            guest: Arc::clone(&self.0),
            addr,
        }))
    }
}

/// Listener standing in for the guest's SSH port. Keep it alive for the test.
pub fn ssh_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Template with the required options set and `output_dir` under `root`.
pub fn template(root: &Path, ssh_port: u16, extra: &str) -> RawConfig {
    let output = root.join("output");
    let json = format!(
        r#"{{
            "iso_url": "file:///isos/install.iso",
            "ssh_username": "root",
            "ssh_port": {},
            "output_directory": {:?}{}
        }}"#,
        ssh_port,
        output.display().to_string(),
        extra
    );
    RawConfig::from_json(&json).unwrap()
}

pub fn output_dir(root: &Path) -> PathBuf {
    root.join("output")
}
