use crate::{DirectoryId, FileId};

pub const PATH_SEPARATOR: char = '/';
pub const DIR_NAME_PREFIX: &str = "dir";
pub const FILE_NAME_PREFIX: &str = "file";
pub const RENAMED_SUFFIX: &str = ".renamed";

pub fn normalize_working_directory(working_directory: &str) -> String {
    working_directory.trim_end_matches(PATH_SEPARATOR).to_owned()
}

pub fn dir_path(parent_path: &str, id: DirectoryId) -> String {
    format!("{parent_path}{PATH_SEPARATOR}{DIR_NAME_PREFIX}{id}")
}

pub fn file_path(directory_path: &str, id: FileId) -> String {
    format!("{directory_path}{PATH_SEPARATOR}{FILE_NAME_PREFIX}{id}")
}

pub fn renamed_path(path: &str) -> String {
    format!("{path}{RENAMED_SUFFIX}")
}

pub fn parent_path(path: &str) -> Option<&str> {
    path.rfind(PATH_SEPARATOR).map(|idx| &path[..idx])
}

pub fn file_name(path: &str) -> &str {
    match path.rfind(PATH_SEPARATOR) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

pub fn directory_id(path: &str) -> Option<DirectoryId> {
    file_name(path).strip_prefix(DIR_NAME_PREFIX)?.parse().ok()
}

pub fn parent_directory_id(path: &str) -> Option<DirectoryId> {
    directory_id(parent_path(path)?)
}
