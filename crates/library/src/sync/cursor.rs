use crate::naming::id_from_name;
use booru_storage::file::FileInfo;

/// Highest post identifier encoded in a canonical file name.
///
/// Files that don't follow the `{id}_{hash}` convention are ignored; a
/// directory without any yields no cursor.
pub(crate) fn highest_id(files: &[FileInfo]) -> Option<u64> {
    files.iter().filter_map(|file| file.path.to_str()).filter_map(id_from_name).max()
}
