use rpcmux_client::config::Config;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Req(String);

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Resp(String);

fn write_temp_yaml(contents: &str) -> tempfile_like::NamedFile {
    tempfile_like::NamedFile::new(contents)
}

/// A tiny stand-in for a temp-file crate: this crate has no `tempfile`
/// dependency, so the test writes into the process's own temp directory
/// under a unique name and removes it on drop.
mod tempfile_like {
    use std::{
        fs,
        path::{Path, PathBuf},
        sync::atomic::{AtomicU64, Ordering},
    };

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    pub struct NamedFile {
        path: PathBuf,
    }

    impl NamedFile {
        pub fn new(contents: &str) -> Self {
            let n = COUNTER.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!("rpcmux_client_test_config_{n}.yaml"));
            fs::write(&path, contents).expect("write temp config file");
            Self { path }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for NamedFile {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.path);
        }
    }
}

#[test]
fn loads_scalar_fields_from_yaml_with_defaults() {
    let file = write_temp_yaml("address: 127.0.0.1:9000\n");

    let cfg = Config::<Req, Resp>::from_file(file.path()).expect("valid minimal config");
    assert_eq!(cfg.address, "127.0.0.1:9000");
    assert_eq!(cfg.connection_count, 1);
    assert_eq!(cfg.pending_requests, rpcmux_client::config::DEFAULT_PENDING_MESSAGES);
    assert!(cfg.compression);
}

#[test]
fn overrides_every_scalar_field() {
    let file = write_temp_yaml(
        "address: 10.0.0.1:1234\n\
         connection_count: 4\n\
         pending_requests: 128\n\
         flush_delay_micros: null\n\
         request_timeout_secs: 5\n\
         compression: false\n\
         send_buffer_size: 4096\n\
         recv_buffer_size: 4096\n",
    );

    let cfg = Config::<Req, Resp>::from_file(file.path()).expect("valid overridden config");
    assert_eq!(cfg.connection_count, 4);
    assert_eq!(cfg.pending_requests, 128);
    assert_eq!(cfg.flush_delay, None);
    assert_eq!(cfg.request_timeout, std::time::Duration::from_secs(5));
    assert!(!cfg.compression);
    assert_eq!(cfg.send_buffer_size, 4096);
    assert_eq!(cfg.recv_buffer_size, 4096);
}

#[test]
fn rejects_empty_address() {
    let file = write_temp_yaml("address: \"\"\n");
    let err = Config::<Req, Resp>::from_file(file.path()).expect_err("empty address is invalid");
    assert!(format!("{err:?}").contains("address must not be empty"));
}

#[test]
fn rejects_missing_file() {
    let missing = std::env::temp_dir().join("rpcmux_client_test_config_does_not_exist.yaml");
    let err = Config::<Req, Resp>::from_file(&missing).expect_err("missing file is an error");
    assert!(format!("{err:?}").contains("failed to read config file"));
}
