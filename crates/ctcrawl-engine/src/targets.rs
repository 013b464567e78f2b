//! Logical targets for the ECS pricing page.
//!
//! Each target carries an ordered fallback chain: scoped CSS selectors
//! first, absolute-XPath snapshots of the rendered tree last. The XPath
//! entries are brittle by nature and only exist to catch markup variants
//! the structural selectors miss.

use ctcrawl_common::locator::{LocatorStrategy, LogicalTarget};

/// Radio groups that render next to the zone group but are billing
/// controls, not zones. Any entry containing one of these terms is
/// discarded during zone enumeration.
pub const ZONE_DENYLIST: &[&str] = &["付费", "按量", "包年", "包月"];

/// Label used for filesystem paths and logs when a pool exposes no zone.
pub const DEFAULT_ZONE_LABEL: &str = "默认可用区";

/// The complete target table for the production page.
#[derive(Debug, Clone)]
pub struct TargetTable {
    pub province_input: LogicalTarget,
    pub province_items: LogicalTarget,
    pub resource_pools: LogicalTarget,
    pub availability_zones: LogicalTarget,
    pub cpu_select: LogicalTarget,
    pub memory_select: LogicalTarget,
    pub cpu_dropdown: LogicalTarget,
    pub memory_dropdown: LogicalTarget,
    pub cpu_dropdown_fallback: LocatorStrategy,
    pub memory_dropdown_fallback: LocatorStrategy,
    pub cpu_architecture: LogicalTarget,
}

const FORM_PREFIX: &str =
    "/html/body/div[1]/div/section[2]/div/div[2]/div[2]/div[2]/div/div/div/div[2]/div[2]/div[1]";

pub fn production() -> TargetTable {
    TargetTable {
        province_input: LogicalTarget::new(
            "province input",
            vec![
                LocatorStrategy::css(".regionLabel input[placeholder=\"区域\"]"),
                LocatorStrategy::css("input[placeholder=\"区域\"]"),
                LocatorStrategy::xpath(format!(
                    "{FORM_PREFIX}/div[2]/form/div[1]/div/div/div/div/input"
                )),
            ],
        ),
        province_items: LogicalTarget::new(
            "province list",
            vec![
                LocatorStrategy::css(
                    "body div.el-select-dropdown:not([style*=\"display: none\"]) ul.arealist > li",
                ),
                LocatorStrategy::css("body div.el-select-dropdown ul.arealist > li"),
                LocatorStrategy::xpath("/html/body/div[2]/div[2]/div/div[2]/ul/li"),
            ],
        ),
        resource_pools: LogicalTarget::new(
            "resource pools",
            vec![
                LocatorStrategy::xpath(
                    "//div[contains(@class,\"el-form-item\")][.//label[contains(.,\"资源池\")]]\
                     //div[contains(@class,\"el-radio-group\")]//label",
                ),
                LocatorStrategy::xpath(format!("{FORM_PREFIX}/div[2]/form/div[2]/div/div/label")),
            ],
        ),
        availability_zones: LogicalTarget::new(
            "availability zones",
            vec![
                LocatorStrategy::xpath(
                    "//div[contains(@class,\"el-form-item\")][contains(.,\"可用区\")]\
                     //div[contains(@class,\"el-radio-group\")]//label",
                ),
                LocatorStrategy::xpath(
                    "//div[contains(@class,\"el-form-item\")][contains(.,\"可用区域\")]\
                     //div[contains(@class,\"el-radio-group\")]//label",
                ),
                LocatorStrategy::xpath(format!(
                    "{FORM_PREFIX}/div[3]/form/div/div[2]/div/label"
                )),
            ],
        ),
        cpu_select: LogicalTarget::new(
            "cpu select control",
            vec![
                LocatorStrategy::xpath(
                    "//div[contains(@class,\"el-form-item\")][contains(.,\"全部CPU\")]\
                     //div[contains(@class,\"el-select__wrapper\")]",
                )
                .nth(0),
                LocatorStrategy::xpath(format!(
                    "{FORM_PREFIX}/div[7]/form/div/div[2]/div[1]/div"
                )),
                LocatorStrategy::xpath(format!(
                    "{FORM_PREFIX}/div[8]/form/div/div[2]/div[1]/div"
                )),
            ],
        ),
        memory_select: LogicalTarget::new(
            "memory select control",
            vec![
                LocatorStrategy::xpath(
                    "//div[contains(@class,\"el-form-item\")][contains(.,\"全部CPU\")]\
                     //div[contains(@class,\"el-select__wrapper\")]",
                )
                .nth(1),
                LocatorStrategy::xpath(format!(
                    "{FORM_PREFIX}/div[7]/form/div/div[2]/div[2]/div"
                )),
                LocatorStrategy::xpath(format!(
                    "{FORM_PREFIX}/div[8]/form/div/div[2]/div[2]/div"
                )),
            ],
        ),
        cpu_dropdown: LogicalTarget::new(
            "cpu option list",
            vec![
                LocatorStrategy::xpath(
                    "//div[contains(@class,\"el-select-dropdown\")][contains(.,\"全部CPU\")]//ul",
                ),
                LocatorStrategy::xpath(
                    "//div[contains(@class,\"el-select-dropdown\")][.//li[contains(.,\"核\")]]//ul",
                ),
                LocatorStrategy::xpath("/html/body/div[2]/div[3]/div/div/div[1]/ul"),
            ],
        ),
        memory_dropdown: LogicalTarget::new(
            "memory option list",
            vec![
                LocatorStrategy::xpath(
                    "//div[contains(@class,\"el-select-dropdown\")][contains(.,\"全部内存\")]//ul",
                ),
                LocatorStrategy::xpath(
                    "//div[contains(@class,\"el-select-dropdown\")][.//li[contains(.,\"G\")]]//ul",
                ),
                LocatorStrategy::xpath("/html/body/div[2]/div[4]/div/div/div[1]/ul"),
            ],
        ),
        cpu_dropdown_fallback: LocatorStrategy::xpath("/html/body/div[2]/div[3]/div/div/div[1]/ul"),
        memory_dropdown_fallback: LocatorStrategy::xpath(
            "/html/body/div[2]/div[4]/div/div/div[1]/ul",
        ),
        cpu_architecture: LogicalTarget::new(
            "cpu architecture radio",
            vec![
                LocatorStrategy::xpath(
                    "//div[contains(@class,\"el-form-item\")][contains(.,\"CPU架构\")]\
                     //div[contains(@class,\"el-radio-group\")]//label",
                ),
                LocatorStrategy::xpath(format!(
                    "{FORM_PREFIX}/div[6]/form/div/div[2]/div/label[1]"
                )),
            ],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_target_has_a_structural_and_a_path_fallback() {
        let table = production();
        for target in [
            &table.province_input,
            &table.province_items,
            &table.resource_pools,
            &table.availability_zones,
            &table.cpu_select,
            &table.memory_select,
            &table.cpu_dropdown,
            &table.memory_dropdown,
            &table.cpu_architecture,
        ] {
            assert!(
                target.strategies.len() >= 2,
                "{} has no fallback",
                target.name
            );
        }
    }
}
