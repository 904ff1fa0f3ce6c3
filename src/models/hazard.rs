use serde::Serialize;

pub const OTHERS: &str = "Others";

#[derive(Debug, Serialize)]
pub struct HazardGroup {
    pub name: &'static str,
    pub hazards: &'static [&'static str],
}

pub const HAZARD_GROUPS: &[HazardGroup] = &[
    HazardGroup {
        name: "Infrastructure & Maintenance",
        hazards: &[
            "Pothole",
            "Faulty Drainage Cover",
            "Cracked Sidewalks",
            "Collapsing Wall",
        ],
    },
    HazardGroup {
        name: "Environmental",
        hazards: &[
            "Waterlogged Area",
            "Blocked Canals",
            "Unclean Vacant Lots",
            "Fallen Trees or Branches",
        ],
    },
    HazardGroup {
        name: "Sanitation & Waste Management",
        hazards: &[
            "Overflowing Garbage",
            "Clogged Drainage",
            "Foul Odor",
            "Improper Disposal",
        ],
    },
    // "Improper Disposal" is listed under two groups.
    HazardGroup {
        name: "Community Facilities & Utilities",
        hazards: &[
            "Entangled Wiring",
            "Broken Streetlights",
            "Faulty Electrical Posts",
            "Improper Disposal",
        ],
    },
];

/// Departments offered when a report is marked in progress.
pub const DEPARTMENTS: &[&str] = &[
    "Construction Department",
    "Garbage Collector",
    "Electrical Department",
    "Water Department",
];

pub fn is_known_hazard(label: &str) -> bool {
    HAZARD_GROUPS
        .iter()
        .any(|group| group.hazards.contains(&label))
}

/// Resolves a hazard selection. "Others" takes the free-text label instead.
pub fn resolve_hazard(selection: &str, custom: Option<&str>) -> Option<String> {
    resolve_selection(selection, custom)
}

/// Resolves an assignee selection. "Others" takes the free-text department instead.
pub fn resolve_assignee(selection: &str, custom: Option<&str>) -> Option<String> {
    resolve_selection(selection, custom)
}

fn resolve_selection(selection: &str, custom: Option<&str>) -> Option<String> {
    let value = if selection.trim() == OTHERS {
        custom.unwrap_or_default().trim()
    } else {
        selection.trim()
    };
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
