//! Job naming and per-project path normalization.
//!
//! Artifact and version-file entries are rewritten relative to the job
//! workspace before generation and restored afterwards via [`PathSnapshot`].

use std::sync::LazyLock;

use regex::Regex;

use buildconf_shared::ProjectToBuild;

/// Characters kept verbatim in job names besides letters and digits.
const NAME_PUNCTUATION: &[char] = &['(', ')', '+', '-', '_'];

/// Relative directory made of segments that do not start with `.` and
/// contain no reserved path characters; one trailing `/` is allowed.
static SAFE_RELATIVE_DIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:[^.\\/:*?"<>|\r\n][^\\/:*?"<>|\r\n]*/?)*$"#).expect("valid regex")
});

/// Replace every character that is not alphanumeric and not in `()+-_`
/// with `_`.
pub fn sanitize_job_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || NAME_PUNCTUATION.contains(&c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Last path segment of a repository URL, without a `.git` suffix.
fn repository_dir_name(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    let segment = match trimmed.rfind('/') {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    };
    segment.strip_suffix(".git").unwrap_or(segment)
}

fn is_safe_relative_dir(dir: &str) -> bool {
    dir != "." && SAFE_RELATIVE_DIR_RE.is_match(dir)
}

/// Prefix prepended to a project's artifact and version-file entries.
///
/// Empty override: the repository directory name. Safe relative override:
/// the override itself. Anything else: no prefix. A non-empty prefix always
/// ends with `/`.
pub fn prefix_for(project: &ProjectToBuild) -> String {
    let local = project.local_directory_path.as_str();
    let mut prefix = if local.is_empty() {
        repository_dir_name(&project.project_url).to_string()
    } else if is_safe_relative_dir(local) {
        local.to_string()
    } else {
        String::new()
    };
    if !prefix.is_empty() && !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix
}

fn strip_current_dir(entry: &str) -> String {
    let mut out = entry.to_string();
    while out.contains("./") {
        out = out.replace("./", "");
    }
    out
}

fn prefixed(prefix: &str, entries: &[String]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| format!("{prefix}{}", strip_current_dir(entry)))
        .collect()
}

/// Strip `./` segments from every artifact and prepend [`prefix_for`].
pub fn normalize_artifacts(project: &mut ProjectToBuild) {
    let prefix = prefix_for(project);
    project.artifacts = prefixed(&prefix, &project.artifacts);
}

/// Same transform as [`normalize_artifacts`], applied to version files.
pub fn normalize_version_files(project: &mut ProjectToBuild) {
    let prefix = prefix_for(project);
    project.version_files = prefixed(&prefix, &project.version_files);
}

/// Derive the local checkout directory from the repository URL when no
/// override is set. Existing overrides (and empty URLs) are left alone.
pub fn resolve_local_directory(project: &mut ProjectToBuild) {
    if project.local_directory_path.is_empty() && !project.project_url.is_empty() {
        project.local_directory_path = repository_dir_name(&project.project_url).to_string();
    }
}

/// Run the three normalization steps on every project, in order.
pub fn normalize_projects(projects: &mut [ProjectToBuild]) {
    for project in projects.iter_mut() {
        normalize_artifacts(project);
        normalize_version_files(project);
        resolve_local_directory(project);
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Original artifact and version-file lists of every project.
#[derive(Debug, Clone)]
pub struct PathSnapshot {
    entries: Vec<(Vec<String>, Vec<String>)>,
}

impl PathSnapshot {
    pub fn capture(projects: &[ProjectToBuild]) -> Self {
        Self {
            entries: projects
                .iter()
                .map(|p| (p.artifacts.clone(), p.version_files.clone()))
                .collect(),
        }
    }

    /// Put the captured lists back. Local directories are not touched.
    pub fn restore(self, projects: &mut [ProjectToBuild]) {
        for (project, (artifacts, version_files)) in projects.iter_mut().zip(self.entries) {
            project.artifacts = artifacts;
            project.version_files = version_files;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(url: &str, local: &str) -> ProjectToBuild {
        ProjectToBuild {
            project_url: url.into(),
            local_directory_path: local.into(),
            ..Default::default()
        }
    }

    #[test]
    fn sanitize_replaces_disallowed_characters() {
        assert_eq!(sanitize_job_name("My Job!"), "My_Job_");
        assert_eq!(sanitize_job_name("core-lib (v2)+x"), "core-lib_(v2)+x");
        assert_eq!(sanitize_job_name("a/b.c"), "a_b_c");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for name in ["My Job!", "ünïcode näme", "a..b//c", "", "(ok)+_-"] {
            let once = sanitize_job_name(name);
            assert_eq!(sanitize_job_name(&once), once);
        }
    }

    #[test]
    fn resolve_local_directory_uses_last_segment() {
        let mut p = project("https://host/org/repo", "");
        resolve_local_directory(&mut p);
        assert_eq!(p.local_directory_path, "repo");

        let mut p = project("https://host/org/demo.git", "");
        resolve_local_directory(&mut p);
        assert_eq!(p.local_directory_path, "demo");
    }

    #[test]
    fn resolve_local_directory_keeps_override_and_empty_url() {
        let mut p = project("https://host/org/repo", "src/custom");
        resolve_local_directory(&mut p);
        assert_eq!(p.local_directory_path, "src/custom");

        let mut p = project("", "");
        resolve_local_directory(&mut p);
        assert_eq!(p.local_directory_path, "");
    }

    #[test]
    fn prefix_for_variants() {
        assert_eq!(prefix_for(&project("https://host/org/repo", "")), "repo/");
        assert_eq!(prefix_for(&project("https://host/org/repo", "checkout")), "checkout/");
        assert_eq!(prefix_for(&project("https://host/org/repo", "a/b/")), "a/b/");
        assert_eq!(prefix_for(&project("https://host/org/repo", ".")), "");
        assert_eq!(prefix_for(&project("https://host/org/repo", "../up")), "");
        assert_eq!(prefix_for(&project("https://host/org/repo", "C:\\work")), "");
        assert_eq!(prefix_for(&project("https://host/org/repo", ".hidden")), "");
        assert_eq!(prefix_for(&project("", "")), "");
    }

    #[test]
    fn artifacts_lose_current_dir_and_gain_prefix_once() {
        let mut p = project("https://host/org/demo.git", "");
        p.artifacts = vec!["./out.zip".into(), "bin/./app.exe".into(), "..//x".into()];
        normalize_artifacts(&mut p);

        assert_eq!(p.artifacts[0], "demo/out.zip");
        assert_eq!(p.artifacts[1], "demo/bin/app.exe");
        for entry in &p.artifacts {
            assert!(!entry.contains("./"), "{entry}");
            assert!(entry.starts_with("demo/"));
            assert!(!entry["demo/".len()..].starts_with("demo/"));
        }
    }

    #[test]
    fn version_files_use_the_same_transform() {
        let mut p = project("https://host/org/repo", "work");
        p.version_files = vec!["./version.h".into()];
        normalize_version_files(&mut p);
        assert_eq!(p.version_files, vec!["work/version.h"]);
    }

    #[test]
    fn snapshot_restores_lists_but_not_local_directory() {
        let mut projects = vec![project("https://host/org/repo", "")];
        projects[0].artifacts = vec!["./a.zip".into()];
        projects[0].version_files = vec!["v.txt".into()];

        let snapshot = PathSnapshot::capture(&projects);
        normalize_projects(&mut projects);
        assert_eq!(projects[0].artifacts, vec!["repo/a.zip"]);

        snapshot.restore(&mut projects);
        assert_eq!(projects[0].artifacts, vec!["./a.zip"]);
        assert_eq!(projects[0].version_files, vec!["v.txt"]);
        assert_eq!(projects[0].local_directory_path, "repo");
    }
}
