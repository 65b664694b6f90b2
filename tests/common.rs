#![allow(dead_code)]

/// Two pages of a maintenance-plan export as they come out of text extraction:
/// a task table followed by its spare parts, page furniture in between.
pub const PLAN: &[&str] = &[
    "Asset: 9000171000 TP A3/F-040V Hydraulic Press",
    "Task Code Trade Task Action Task Description Doc Ref Interval",
    "1 Pre-Maintenance \\ Checks (9000171371)",
    "9465150 ENGR Check Check warning labels 1000 Hours",
    "9465160 TECH Check Check labels No reference",
    "*9465170 ENGR Inspect Inspect hoses for",
    "wear and leaks HSE 6 Months",
    "Database: PROD",
    "Printed by jsmith on 01/02/2024",
    "Page 1 of 2",
    "2 Overhaul \\ Pump (9000172000)",
    "9465180 MECH Replace Replace pump seals 4.2.5.1-3 No Interval",
    "9465150 ENGR Check Check warning labels on both sides 1000 Hours",
    "Part No Part Description Task Code Task Action Component Tree Path Qty Required UOM",
    "1550595-9960 Seal Kit 9465180 Replace [648575-0400] 2 EA",
    "1550596-0001 O-Ring 9465180 Replace",
    "Pump \\ Housing (9000172001) 4 EA",
    "1550597-0002 Label set *9465150 Check 1 PC",
    "1550595-9960 Seal Kit 9465180 Replace [648575-0400] 2 EA",
    "1550598-0003 Grease cartridge",
    "Page 2 of 2",
];

pub fn plan_lines() -> Vec<String> {
    PLAN.iter().map(|s| s.to_string()).collect()
}
