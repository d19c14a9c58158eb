use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::browser::Browser;
use crate::config::{Credentials, TargetPeriod};
use crate::error::Result;
use crate::mobius::{snapshot, ArchiveView, Mobius};
use crate::portals::delaware::DelawareGov;
use crate::portals::dsc::DataServiceCenter;
use crate::portals::fsf::Fsf;

pub const MOBIUS_REPORTS: [&str; 3] = ["DGL060", "DGL114", "DGL115"];
pub const MOBIUS_REPORTS_PATH: [&str; 3] = ["Repositories", "First State Financials", "Reports"];
const SNAPSHOT_SCAN_LIMIT: usize = 400;

pub const PROGRAM_SUMMARY_FILE: &str = "fsf.operating-unit-program-summary";
pub const EXPENDITURE_SUMMARY_FILE: &str = "fsf.operating-unit-expenditure-summary";
pub const DETAILED_ACTIVITY_FILE: &str = "fsf.detailed-activity.csv";

#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub base_dir: PathBuf,
    pub period: TargetPeriod,
    pub divisions: Vec<String>,
    pub detailed_activity: bool,
}

#[derive(Debug, Default)]
pub struct FetchSummary {
    pub written: Vec<String>,
    pub skipped: Vec<String>,
}

/// The name of a division's document inside a Mobius snapshot.
pub fn export_token(division: &str) -> String {
    format!("95{division}00")
}

pub fn mobius_file_name(report: &str, division: &str) -> String {
    format!("mobius.{report}.{division}.csv")
}

fn save_unless_present(
    summary: &mut FetchSummary,
    dir: &Path,
    name: &str,
    download: impl FnOnce() -> Result<Vec<u8>>,
) -> Result<()> {
    let path = dir.join(name);
    if path.exists() {
        info!("{name} already exists; skipping");
        summary.skipped.push(name.to_string());
        return Ok(());
    }
    let contents = download()?;
    std::fs::write(&path, contents)?;
    info!("Wrote {}", path.display());
    summary.written.push(name.to_string());
    Ok(())
}

/// Download the FSF summary reports, plus the detailed activity list when asked.
pub fn fetch_fsf<B: Browser>(
    fsf: &mut Fsf<'_, B>,
    plan: &FetchPlan,
    summary: &mut FetchSummary,
) -> Result<()> {
    let dir = plan.base_dir.as_path();
    let period = plan.period;
    for format in ["csv", "pdf"] {
        save_unless_present(summary, dir, &format!("{PROGRAM_SUMMARY_FILE}.{format}"), || {
            fsf.download_program_summary(period, false, format)
        })?;
    }
    for format in ["csv", "pdf"] {
        save_unless_present(summary, dir, &format!("{EXPENDITURE_SUMMARY_FILE}.{format}"), || {
            fsf.download_expenditure_summary(period, Some(plan.divisions.as_slice()), format)
        })?;
    }
    if plan.detailed_activity {
        save_unless_present(summary, dir, DETAILED_ACTIVITY_FILE, || {
            fsf.download_detailed_activity(
                period.first_day(),
                period.last_day(),
                Some(plan.divisions.as_slice()),
                "csv",
            )
        })?;
    }
    Ok(())
}

/// Export every division's file of each ledger report from the snapshot covering the period.
pub fn fetch_mobius<V: ArchiveView>(
    mobius: &mut Mobius<V>,
    plan: &FetchPlan,
    summary: &mut FetchSummary,
) -> Result<()> {
    for report in MOBIUS_REPORTS {
        let names: Vec<String> = plan
            .divisions
            .iter()
            .map(|d| mobius_file_name(report, d))
            .collect();
        if names.iter().all(|n| plan.base_dir.join(n).exists()) {
            info!("All {report} files exist; skipping");
            summary.skipped.extend(names);
            continue;
        }

        let mut path: Vec<String> = MOBIUS_REPORTS_PATH.iter().map(|s| s.to_string()).collect();
        path.push(report.to_string());
        mobius.go_to_report(&path)?;
        let entries = mobius.items_up_to(SNAPSHOT_SCAN_LIMIT)?;
        let snapshot = snapshot::select_snapshot(&entries, plan.period)?;
        info!("Using {report} snapshot {snapshot}");

        let mut dated = path.clone();
        dated.push(snapshot);

        for (division, name) in plan.divisions.iter().zip(&names) {
            info!("Exporting report {report} for division {division}.");
            save_unless_present(summary, &plan.base_dir, name, || {
                // The archive has to be re-entered for every document.
                mobius.go_to_report(&path)?;
                mobius.go_to_report(&dated)?;
                mobius.extract_report(report, &export_token(division))
            })?;
        }
    }
    Ok(())
}

/// Run every portal the credentials allow, in order. The first failure ends the run.
///
/// A report file that already exists counts as done and is not fetched again,
/// so a failed run can be started over.
pub fn run<B: Browser>(browser: &mut B, creds: &Credentials, plan: &FetchPlan) -> Result<FetchSummary> {
    std::fs::create_dir_all(&plan.base_dir)?;
    let mut summary = FetchSummary::default();
    info!("Divisions: {:?}", plan.divisions);

    if let Some(login) = &creds.dsc {
        info!("Doing: DSC");
        let mut dsc = DataServiceCenter::new(&mut *browser);
        dsc.login(&creds.district, &login.username, &login.password)?;
        let mut fsf = dsc.fsf()?;
        fetch_fsf(&mut fsf, plan, &mut summary)?;
    }

    if let Some(login) = &creds.delaware {
        info!("Doing: Delaware.gov");
        let mut gov = DelawareGov::new(&mut *browser);
        gov.login(&login.username, &login.password)?;

        match &creds.erp {
            Some(erp_login) => {
                info!("Doing: ERP");
                let mut erp = gov.erp()?;
                erp.login(&erp_login.username, &erp_login.password)?;
                let mut mobius = erp.mobius()?;
                fetch_mobius(&mut mobius, plan, &mut summary)?;
            }
            None => warn!("No ERP credentials; skipping Mobius reports"),
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakeBrowser;
    use crate::config::PortalLogin;
    use crate::mobius::fake::FakeArchive;
    use crate::portals::dsc::tests::dsc_site;
    use crate::portals::fsf::tests::fsf_site;
    use zeroize::Zeroizing;

    const JAN_END: &str = "Jan 31, 2025 11:43:10 PM";

    fn plan(dir: &Path) -> FetchPlan {
        FetchPlan {
            base_dir: dir.to_path_buf(),
            period: TargetPeriod::new(2025, 1).unwrap(),
            divisions: vec!["33".to_string(), "51".to_string()],
            detailed_activity: false,
        }
    }

    fn archive() -> FakeArchive {
        let mut archive = FakeArchive::new("Repositories");
        for report in MOBIUS_REPORTS {
            let reports = ["First State Financials", "Reports", report];
            for date in ["Jan 15, 2025 6:00:00 AM", JAN_END, "Feb 4, 2025 6:00:00 AM"] {
                archive.folder(&[reports[0], reports[1], reports[2], date]);
            }
            for division in ["33", "51", "56", "60"] {
                archive.document(
                    &[reports[0], reports[1], reports[2], JAN_END],
                    &export_token(division),
                );
            }
        }
        archive
    }

    #[test]
    fn test_names() {
        assert_eq!(export_token("33"), "953300");
        assert_eq!(mobius_file_name("DGL115", "60"), "mobius.DGL115.60.csv");
    }

    #[test]
    fn test_fetch_mobius_writes_every_division() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(dir.path());
        let mut mobius = Mobius::new(archive());
        let mut summary = FetchSummary::default();
        fetch_mobius(&mut mobius, &plan, &mut summary).unwrap();

        assert_eq!(summary.written.len(), 6);
        assert!(summary.skipped.is_empty());
        let contents = std::fs::read_to_string(dir.path().join("mobius.DGL114.51.csv")).unwrap();
        assert_eq!(contents, "955100/DGL114 unzipped");
        assert_eq!(mobius.view().exports.len(), 6);
    }

    #[test]
    fn test_fetch_mobius_skips_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(dir.path());
        for division in ["33", "51"] {
            std::fs::write(dir.path().join(mobius_file_name("DGL060", division)), "x").unwrap();
        }
        std::fs::write(dir.path().join(mobius_file_name("DGL115", "33")), "x").unwrap();

        let mut mobius = Mobius::new(archive());
        let mut summary = FetchSummary::default();
        fetch_mobius(&mut mobius, &plan, &mut summary).unwrap();

        assert_eq!(summary.skipped.len(), 3);
        assert_eq!(
            summary.written,
            vec![
                "mobius.DGL114.33.csv",
                "mobius.DGL114.51.csv",
                "mobius.DGL115.51.csv"
            ]
        );
        let exports = &mobius.view().exports;
        assert!(exports.iter().all(|(_, report)| report != "DGL060"));
    }

    #[test]
    fn test_fetch_mobius_without_snapshot_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = plan(dir.path());
        plan.period = TargetPeriod::new(2025, 3).unwrap();
        let mut mobius = Mobius::new(archive());
        let mut summary = FetchSummary::default();
        let err = fetch_mobius(&mut mobius, &plan, &mut summary).unwrap_err();
        assert!(matches!(
            err,
            crate::error::CbocError::DateFileNotFound { year: 2025, month: 3 }
        ));
        assert!(summary.written.is_empty());
    }

    fn login(username: &str) -> Option<PortalLogin> {
        Some(PortalLogin {
            username: username.to_string(),
            password: Zeroizing::new("pw".to_string()),
        })
    }

    #[test]
    fn test_run_downloads_fsf_reports() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = plan(dir.path());
        plan.detailed_activity = true;
        std::fs::write(dir.path().join("fsf.operating-unit-program-summary.pdf"), "old").unwrap();

        let mut fake = FakeBrowser::new();
        dsc_site(&mut fake, true);
        fsf_site(&mut fake);
        for body in ["program csv", "expenditure csv", "expenditure pdf", "activity"] {
            fake.queue_download(body.as_bytes());
        }
        let creds = Credentials {
            district: "Christina".to_string(),
            dsc: login("jdoe"),
            delaware: None,
            erp: None,
        };

        let summary = run(&mut fake, &creds, &plan).unwrap();
        assert_eq!(summary.written.len(), 4);
        assert_eq!(summary.skipped, vec!["fsf.operating-unit-program-summary.pdf"]);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("fsf.operating-unit-expenditure-summary.pdf"))
                .unwrap(),
            "expenditure pdf"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join(DETAILED_ACTIVITY_FILE)).unwrap(),
            "activity"
        );
    }

    #[test]
    fn test_run_without_credentials_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut fake = FakeBrowser::new();
        let creds = Credentials {
            district: "Christina".to_string(),
            dsc: None,
            delaware: None,
            erp: None,
        };
        let summary = run(&mut fake, &creds, &plan(dir.path())).unwrap();
        assert!(summary.written.is_empty());
        assert!(fake.opened.is_empty());
    }

    #[test]
    fn test_run_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut fake = FakeBrowser::new();
        dsc_site(&mut fake, false);
        let creds = Credentials {
            district: "Christina".to_string(),
            dsc: login("jdoe"),
            delaware: login("jdoe@example.org"),
            erp: None,
        };
        assert!(run(&mut fake, &creds, &plan(dir.path())).is_err());
        assert_eq!(fake.opened.len(), 1);
    }
}
