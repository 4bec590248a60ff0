//! Committing CIDR blocks to a kernel `ipset` set.
//!
//! A set is built in one go: `create` sized for every matched address, then one
//! `add` per block in order. The first failure aborts the run; a half-filled
//! set is reported, never silently accepted.

use std::ffi::OsStr;
use std::process::{Command, Stdio};

use crate::cidr::CidrBlock;
use crate::database::MatchedRecord;
use crate::error::{GeoblockError, Result};
use crate::prompt::Confirm;

/// Extra slots reserved on top of the matched address count, so operators can
/// add a few addresses by hand later.
pub const MAXELEM_HEADROOM: u64 = 1000;

/// Set type used for every created set.
pub const SET_TYPE: &str = "hash:ip";

/// Everything needed to build one set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRequest {
    pub name: String,
    pub blocks: Vec<CidrBlock>,
    pub total_addresses: u64,
}

impl SetRequest {
    /// Collect the output of [`crate::filter_records`] into a request.
	///
	/// Stops at the first error.
    pub fn from_matches<I>(name: impl Into<String>, matches: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<MatchedRecord>>,
    {
        let mut blocks = Vec::new();
        let mut total_addresses = 0;
        for matched in matches {
            let matched = matched?;
            total_addresses += matched.block_size;
            blocks.extend(matched.blocks);
        }
        Ok(SetRequest {
            name: name.into(),
            blocks,
            total_addresses,
        })
    }

    /// `maxelem` value the set is created with.
    pub fn maxelem(&self) -> u64 {
        self.total_addresses + MAXELEM_HEADROOM
    }
}

/// Packet-filter operations needed to build a set.
pub trait SetBackend {
    fn create(&mut self, name: &str, maxelem: u64) -> Result<()>;
    fn add(&mut self, name: &str, block: &CidrBlock) -> Result<()>;
}

/// Result of [`sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The set was created and every block added.
    Committed { added: usize },
    /// The operator declined; nothing was touched.
    Declined,
}

/// Create the set described by `request` and add all its blocks.
///
/// Asks for confirmation first. Blocks are added in request order and the
/// first backend error is returned without issuing further calls.
pub fn sync(
    request: &SetRequest,
    backend: &mut dyn SetBackend,
    confirm: &mut dyn Confirm,
) -> Result<SyncOutcome> {
    let question = format!(
        "Do you want to add {} IPs to {}?",
        request.total_addresses, request.name
    );
    if !confirm.confirm(&question) {
        return Ok(SyncOutcome::Declined);
    }

    log::info!("Creating an ipset with name {}...", request.name);
    backend.create(&request.name, request.maxelem())?;

    for block in &request.blocks {
        log::info!("Adding {} to IPSet {}", block, request.name);
        backend.add(&request.name, block)?;
    }

    Ok(SyncOutcome::Committed {
        added: request.blocks.len(),
    })
}

/// The `ipset` command-line tool.
///
/// With `dry_run` set, commands are logged instead of executed.
#[derive(Debug, Clone)]
pub struct Ipset {
    program: String,
    dry_run: bool,
}

impl Default for Ipset {
    fn default() -> Self {
        Ipset::new("ipset", false)
    }
}

impl Ipset {
    pub fn new(program: impl Into<String>, dry_run: bool) -> Self {
        Ipset {
            program: program.into(),
            dry_run,
        }
    }

    /// Check that the tool can be executed at all.
	///
	/// Runs `ipset help`; skipped in dry-run mode.
    pub fn ensure_available(&self) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        Command::new(&self.program)
            .arg("help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|_| ())
            .map_err(|e| GeoblockError::ExternalToolFailure {
                command: format!("{} help", self.program),
                reason: format!("{} does not seem to be installed: {}", self.program, e),
            })
    }

    /// Shell command an operator can run to inspect a set.
    pub fn list_command(&self, name: &str) -> String {
        format!("{} list {}", self.program, name)
    }

    /// Shell command an operator can run to remove a set.
    pub fn destroy_command(&self, name: &str) -> String {
        format!("{} destroy {}", self.program, name)
    }

    fn run<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<()> {
        let rendered = std::iter::once(self.program.as_str())
            .chain(args.iter().map(|a| a.as_ref().to_str().unwrap_or("?")))
            .collect::<Vec<_>>()
            .join(" ");

        if self.dry_run {
            log::debug!("[dry run] {}", rendered);
            return Ok(());
        }

        log::debug!("Running {}", rendered);
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| GeoblockError::ExternalToolFailure {
                command: rendered.clone(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(GeoblockError::ExternalToolFailure {
                command: rendered,
                reason: if stderr.is_empty() {
                    output.status.to_string()
                } else {
                    stderr
                },
            })
        }
    }
}

impl SetBackend for Ipset {
    fn create(&mut self, name: &str, maxelem: u64) -> Result<()> {
        let maxelem = maxelem.to_string();
        self.run(&["create", name, SET_TYPE, "maxelem", maxelem.as_str()])
    }

    fn add(&mut self, name: &str, block: &CidrBlock) -> Result<()> {
        let block = block.to_string();
        self.run(&["add", name, block.as_str()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingBackend {
        calls: Vec<String>,
        fail_on_add: Option<usize>,
        adds: usize,
    }

    impl SetBackend for RecordingBackend {
        fn create(&mut self, name: &str, maxelem: u64) -> Result<()> {
            self.calls.push(format!("create {} {}", name, maxelem));
            Ok(())
        }

        fn add(&mut self, name: &str, block: &CidrBlock) -> Result<()> {
            self.adds += 1;
            self.calls.push(format!("add {} {}", name, block));
            if self.fail_on_add == Some(self.adds) {
                return Err(GeoblockError::ExternalToolFailure {
                    command: format!("ipset add {} {}", name, block),
                    reason: "Hash is full".into(),
                });
            }
            Ok(())
        }
    }

    fn request() -> SetRequest {
        let blocks: Vec<CidrBlock> = ["10.0.0.1/32", "10.0.0.2/31", "10.0.1.0/24"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        SetRequest {
            name: "geoblock-test".into(),
            total_addresses: crate::cidr::total_size(&blocks),
            blocks,
        }
    }

    #[test]
    fn test_create_then_add_in_order() {
        let mut backend = RecordingBackend::default();
        let mut confirm = |_: &str| true;

        let outcome = sync(&request(), &mut backend, &mut confirm).unwrap();

        assert_eq!(outcome, SyncOutcome::Committed { added: 3 });
        assert_eq!(
            backend.calls,
            [
                "create geoblock-test 1259",
                "add geoblock-test 10.0.0.1/32",
                "add geoblock-test 10.0.0.2/31",
                "add geoblock-test 10.0.1.0/24",
            ]
        );
    }

    #[test]
    fn test_decline_touches_nothing() {
        let mut backend = RecordingBackend::default();
        let mut question = String::new();
        let mut confirm = |q: &str| {
            question = q.to_string();
            false
        };

        let outcome = sync(&request(), &mut backend, &mut confirm).unwrap();

        assert_eq!(outcome, SyncOutcome::Declined);
        assert!(backend.calls.is_empty());
        assert_eq!(question, "Do you want to add 259 IPs to geoblock-test?");
    }

    #[test]
    fn test_stops_at_first_failed_add() {
        let mut backend = RecordingBackend {
            fail_on_add: Some(2),
            ..Default::default()
        };
        let mut confirm = |_: &str| true;

        let err = sync(&request(), &mut backend, &mut confirm).unwrap_err();

        assert!(matches!(err, GeoblockError::ExternalToolFailure { .. }));
        assert_eq!(backend.calls.len(), 3);
        assert_eq!(backend.calls.last().unwrap(), "add geoblock-test 10.0.0.2/31");
    }

    #[test]
    fn test_request_from_matches() {
        let wanted = [crate::CountryCode::parse("FR").unwrap()];
        let records = vec![
            crate::GeoRecord::new(167772161, 167772163, "FR"),
            crate::GeoRecord::new(167772164, 167772167, "US"),
            crate::GeoRecord::new(167772168, 167772175, "FR"),
        ];

        let request =
            SetRequest::from_matches("fr", crate::filter_records(records, &wanted)).unwrap();

        assert_eq!(request.total_addresses, 3 + 8);
        assert_eq!(request.blocks.len(), 3);
        assert_eq!(request.maxelem(), 1011);
    }

    #[test]
    fn test_dry_run_executes_nothing() {
        let mut ipset = Ipset::new("/nonexistent/ipset", true);
        ipset.ensure_available().unwrap();
        ipset.create("geoblock-test", 1000).unwrap();
        ipset.add("geoblock-test", &"10.0.0.0/8".parse().unwrap()).unwrap();
    }

    #[test]
    fn test_missing_tool_is_reported() {
        let mut ipset = Ipset::new("/nonexistent/ipset", false);
        assert!(matches!(
            ipset.ensure_available(),
            Err(GeoblockError::ExternalToolFailure { .. })
        ));
        assert!(ipset.create("geoblock-test", 1000).is_err());
    }

    #[test]
    fn test_operator_hints() {
        let ipset = Ipset::default();
        assert_eq!(ipset.list_command("geoblock-de"), "ipset list geoblock-de");
        assert_eq!(ipset.destroy_command("geoblock-de"), "ipset destroy geoblock-de");
    }
}
