// -
// Database namespaces

/// Sled database tree namespaces
pub(crate) const BOOKS_TREE: &str = "_books";
pub(crate) const LOANS_TREE: &str = "_loans";
pub(crate) const MEMBERS_TREE: &str = "_members";
pub(crate) const MEMBER_COUNTS_TREE: &str = "_member_active_loan_counts";
pub(crate) const RESERVATIONS_TREE: &str = "_reservations";
pub(crate) const RESERVATION_INDEX_TREE: &str = "_reservation_index";
pub(crate) const RATINGS_TREE: &str = "_ratings";
pub(crate) const ACTIVITY_LOG_TREE: &str = "_activity_log";
pub(crate) const NOTIFICATIONS_TREE: &str = "_notifications";
pub(crate) const META_TREE: &str = "_meta";

/// Sled entry key namespaces
pub(crate) const META_KEY_HEALTH_PROBE: &str = "_health_probe";

/// Backup file prefix
pub(crate) const BACKUP_FILE_PREFIX: &str = "backup-";
