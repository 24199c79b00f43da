use uuid::Uuid;

/// Make an upload name unique while keeping its extension(s):
/// `report.tar.gz` becomes `report-<uuid>.tar.gz`.
pub fn random_filename(filename: &str) -> String {
    let id = Uuid::now_v7();
    match filename.split_once('.') {
        Some((stem, ext)) => format!("{stem}-{id}.{ext}"),
        None => format!("{filename}-{id}"),
    }
}
