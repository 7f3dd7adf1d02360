//! eMMC identity and the known-bad firmware table.

use crate::paths::emmc_attribute;
use crate::Prober;
use serde::Serialize;

/// What a buggy eMMC firmware can do to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmmcImpact {
    None,
    Corruption,
    Brick,
}

impl std::fmt::Display for EmmcImpact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmmcImpact::None => write!(f, "none"),
            EmmcImpact::Corruption => write!(f, "corruption"),
            EmmcImpact::Brick => write!(f, "brick"),
        }
    }
}

struct BuggedEmmc {
    name: &'static str,
    manfid: &'static str,
    /// Firmware revision; `"0"` matches any revision.
    rev: &'static str,
    impact: EmmcImpact,
}

const fn bugged(name: &'static str, manfid: &'static str, rev: &'static str) -> BuggedEmmc {
    BuggedEmmc {
        name,
        manfid,
        rev,
        impact: EmmcImpact::Brick,
    }
}

/// Samsung parts with the secure-erase brick bug.
const BUGGED_EMMC: &[BuggedEmmc] = &[
    bugged("KYL00M", "15", "25"),
    bugged("M8G2FA", "15", "0"),
    bugged("MAG2GA", "15", "0"),
    bugged("MAG4FA", "15", "25"),
    bugged("MBG8FA", "15", "0"),
    bugged("MCGAFA", "15", "0"),
    bugged("VAL00M", "15", "0"),
    bugged("VTU001", "15", "f1"),
    bugged("VYL00M", "15", "0"),
    bugged("VZL00M", "15", "0"),
];

/// Placeholder revision when the CID is too short.
pub const UNKNOWN_REV: &str = "-";

/// Identity of `mmcblk0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmmcInfo {
    pub cid: Option<String>,
    pub date: Option<String>,
    /// Manufacturer id as reported, e.g. `0x000015`.
    pub manfid: Option<String>,
    pub name: Option<String>,
    /// Firmware revision, characters 18..20 of the CID.
    pub rev: String,
}

impl EmmcInfo {
    pub fn new(
        cid: Option<String>,
        date: Option<String>,
        manfid: Option<String>,
        name: Option<String>,
    ) -> Self {
        let rev = cid
            .as_deref()
            .map(rev_from_cid)
            .unwrap_or_else(|| UNKNOWN_REV.to_string());
        Self {
            cid,
            date,
            manfid,
            name,
            rev,
        }
    }

    /// Impact of a known firmware bug on this part, if it is listed.
    pub fn bug_impact(&self) -> Option<EmmcImpact> {
        let name = self.name.as_deref()?;
        let manfid = normalize_manfid(self.manfid.as_deref()?);
        BUGGED_EMMC
            .iter()
            .find(|b| {
                b.name == name
                    && b.manfid == manfid
                    && !b.rev.is_empty()
                    && (b.rev == "0" || b.rev.eq_ignore_ascii_case(&self.rev))
            })
            .map(|b| b.impact)
    }

    /// True if erasing this part may brick the device.
    pub fn can_brick(&self) -> bool {
        self.bug_impact() == Some(EmmcImpact::Brick)
    }

    /// Reads the first eMMC's identity files.
    pub async fn read(prober: &Prober) -> Self {
        let mut values = Vec::with_capacity(4);
        for attribute in ["cid", "date", "manfid", "name"] {
            let value = prober
                .read_text(&emmc_attribute(attribute))
                .await
                .and_then(|content| content.lines().next().map(|l| l.trim().to_string()))
                .filter(|value| !value.is_empty());
            values.push(value);
        }
        let mut values = values.into_iter();
        Self::new(
            values.next().flatten(),
            values.next().flatten(),
            values.next().flatten(),
            values.next().flatten(),
        )
    }
}

/// Revision from a CID; [`UNKNOWN_REV`] unless the CID is longer than 20.
pub fn rev_from_cid(cid: &str) -> String {
    if cid.len() <= 20 {
        return UNKNOWN_REV.to_string();
    }
    cid.get(18..20).unwrap_or(UNKNOWN_REV).to_string()
}

/// `0x000015` and `15` both become `15`.
fn normalize_manfid(manfid: &str) -> String {
    let manfid = manfid.trim();
    let hex = manfid
        .strip_prefix("0x")
        .or_else(|| manfid.strip_prefix("0X"))
        .unwrap_or(manfid);
    let trimmed = hex.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryReader, ScriptedExecutor};
    use std::sync::Arc;

    const CID: &str = "15010056414c30304d04f1a2b3c4d500";

    fn info(name: &str, manfid: &str, cid: &str) -> EmmcInfo {
        EmmcInfo::new(
            Some(cid.to_string()),
            None,
            Some(manfid.to_string()),
            Some(name.to_string()),
        )
    }

    #[test]
    fn test_rev_from_cid() {
        assert_eq!(rev_from_cid(CID), "04");
        assert_eq!(rev_from_cid("150100564d4147324725aa"), "25");
        assert_eq!(rev_from_cid("15010056414c30304d04f"), "04");
        assert_eq!(rev_from_cid("15010056414c30304d04"), UNKNOWN_REV);
        assert_eq!(rev_from_cid(""), UNKNOWN_REV);
        assert_eq!(EmmcInfo::new(None, None, None, None).rev, UNKNOWN_REV);
    }

    #[test]
    fn test_wildcard_revision_matches_any() {
        let emmc = info("VAL00M", "0x000015", CID);
        assert_eq!(emmc.bug_impact(), Some(EmmcImpact::Brick));
        assert!(emmc.can_brick());
        assert!(info("MAG2GA", "15", "short").can_brick());
    }

    #[test]
    fn test_exact_revision_required() {
        assert!(info("KYL00M", "0x15", "150100564d4147324725aa").can_brick());
        assert!(!info("KYL00M", "0x15", CID).can_brick());
        assert!(info("VTU001", "0x000015", "150100565455303031f1aa").can_brick());
    }

    #[test]
    fn test_unlisted_parts_are_safe() {
        assert!(!info("VAL00M", "0x000011", CID).can_brick());
        assert!(!info("SEM16G", "0x000015", CID).can_brick());
        assert_eq!(EmmcInfo::new(None, None, None, None).bug_impact(), None);
    }

    #[tokio::test]
    async fn test_read() {
        let reader = MemoryReader::new()
            .with_file(&emmc_attribute("cid"), &format!("{}\n", CID))
            .with_file(&emmc_attribute("date"), "06/2013")
            .with_file(&emmc_attribute("manfid"), "0x000015")
            .with_file(&emmc_attribute("name"), "VAL00M");
        let prober = Prober::new(Arc::new(reader), Arc::new(ScriptedExecutor::unavailable()));

        let emmc = EmmcInfo::read(&prober).await;
        assert_eq!(emmc.date.as_deref(), Some("06/2013"));
        assert_eq!(emmc.rev, "04");
        assert!(emmc.can_brick());
    }

    #[tokio::test]
    async fn test_read_missing_device() {
        let prober = Prober::new(
            Arc::new(MemoryReader::new()),
            Arc::new(ScriptedExecutor::unavailable()),
        );
        let emmc = EmmcInfo::read(&prober).await;
        assert_eq!(emmc.name, None);
        assert_eq!(emmc.rev, UNKNOWN_REV);
        assert!(!emmc.can_brick());
    }
}
