#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftUninstallStatus {
    SoftUninstalled,
    AlreadySoftUninstalled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftUninstallResult {
    pub name: String,
    pub version: String,
    pub status: SoftUninstallStatus,
}
