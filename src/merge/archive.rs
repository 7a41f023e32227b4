use crate::error::Result;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Extracts every `.zip` found directly inside `dir` into `dir` itself,
/// returning how many archives were unpacked.
///
/// Archives stay in place next to their members, so re-running simply
/// overwrites identically-named fragments. Zero archives is a no-op.
pub fn extract_archives(dir: &Path) -> Result<usize> {
    let mut extracted = 0;

    let mut archives: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
        })
        .collect();
    archives.sort();

    for path in archives {
        log::info!("Extracting {}", path.display());
        let mut archive = zip::ZipArchive::new(File::open(&path)?)?;
        for i in 0..archive.len() {
            let mut member = archive.by_index(i)?;
            if member.is_dir() {
                continue;
            }
            // Members are flattened to their file names; the bundles we
            // consume carry flat CSV entries anyway.
            let Some(name) = member
                .enclosed_name()
                .and_then(|p| p.file_name().map(PathBuf::from))
            else {
                continue;
            };
            let mut out = File::create(dir.join(name))?;
            io::copy(&mut member, &mut out)?;
        }
        extracted += 1;
    }

    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, members: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, content) in members {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn extracts_members_and_keeps_the_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        write_zip(
            &archive,
            &[("a.csv", "id,v\nA,1\n"), ("b.csv", "id,v\nB,2\n")],
        );

        let count = extract_archives(dir.path()).unwrap();

        assert_eq!(count, 1);
        assert!(archive.exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.csv")).unwrap(),
            "id,v\nA,1\n"
        );
        assert!(dir.path().join("b.csv").exists());
    }

    #[test]
    fn reextraction_overwrites_existing_members() {
        let dir = tempfile::tempdir().unwrap();
        write_zip(&dir.path().join("bundle.zip"), &[("a.csv", "id,v\nA,1\n")]);

        extract_archives(dir.path()).unwrap();
        std::fs::write(dir.path().join("a.csv"), "tampered").unwrap();
        extract_archives(dir.path()).unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.csv")).unwrap(),
            "id,v\nA,1\n"
        );
    }

    #[test]
    fn empty_directory_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(extract_archives(dir.path()).unwrap(), 0);
    }

    #[test]
    fn non_zip_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        assert_eq!(extract_archives(dir.path()).unwrap(), 0);
    }
}
