use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RolePermission {
    Owner,
    GetOwnReports,
    GetReports,
    UpdateReport,
    DeleteReport,
    GetAnalytics,
    ManageRegistrations,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Resident,
    Admin,
    Superadmin,
}

impl Role {
    pub fn permission(self) -> &'static [RolePermission] {
        match self {
            Role::Resident => &[RolePermission::GetOwnReports],
            Role::Admin => &[
                RolePermission::GetReports,
                RolePermission::UpdateReport,
                RolePermission::DeleteReport,
                RolePermission::GetAnalytics,
            ],
            Role::Superadmin => &[RolePermission::Owner],
        }
    }
    pub fn validate(self, permit: &RolePermission) -> bool {
        self.permission().iter().any(|permission| match permission {
            RolePermission::Owner => true,
            _ => permission == permit,
        })
    }
}
