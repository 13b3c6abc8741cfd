use std::{
    fs,
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::{paths, Result};

/// Lists the files a docker build reads from its context: the Dockerfile itself and everything
/// copied by `COPY` and `ADD` instructions, minus what `.dockerignore` excludes. Paths are relative
/// to the workspace.
pub fn dependencies(workspace: &Path, dockerfile: &Path) -> Result<Vec<PathBuf>> {
    let dockerfile_path = workspace.join(dockerfile);
    let contents = fs::read_to_string(&dockerfile_path).map_err(|error| {
        format!(
            "failed to read dockerfile {}: {error}",
            dockerfile_path.display()
        )
    })?;
    let ignore = DockerIgnore::load(workspace)?;

    let mut dependencies = vec![dockerfile.to_owned()];
    for source in copied_sources(&contents)? {
        for path in expand_wildcards(workspace, &source)? {
            dependencies.extend(
                paths::files_under(workspace, &path)?
                    .into_iter()
                    .filter(|file| !ignore.is_excluded(file)),
            );
        }
    }
    dependencies.sort();
    dependencies.dedup();
    Ok(dependencies)
}

/// Joins continued lines and drops comments and blank lines.
fn instructions(contents: &str) -> Vec<String> {
    let mut instructions = Vec::new();
    let mut current = String::new();
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('#') || (trimmed.is_empty() && current.is_empty()) {
            continue;
        }
        match trimmed.strip_suffix('\\') {
            Some(continued) => {
                current.push_str(continued);
                current.push(' ');
            }
            None => {
                current.push_str(trimmed);
                instructions.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.trim().is_empty() {
        instructions.push(current);
    }
    instructions
}

/// Returns the sources of the `COPY` and `ADD` instructions that read from the build context.
fn copied_sources(contents: &str) -> Result<Vec<String>> {
    let mut sources = Vec::new();
    for instruction in instructions(contents) {
        let Some((keyword, mut rest)) = instruction.split_once(char::is_whitespace) else {
            continue;
        };
        if !keyword.eq_ignore_ascii_case("COPY") && !keyword.eq_ignore_ascii_case("ADD") {
            continue;
        }

        let mut from_stage = false;
        rest = rest.trim_start();
        while rest.starts_with("--") {
            let (flag, remainder) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            from_stage |= flag.starts_with("--from");
            rest = remainder.trim_start();
        }
        if from_stage {
            continue;
        }

        let arguments: Vec<String> = if rest.starts_with('[') {
            serde_json::from_str(rest)
                .map_err(|error| format!("invalid instruction `{instruction}`: {error}"))?
        } else {
            rest.split_whitespace().map(str::to_owned).collect()
        };

        // The last argument is the destination.
        if let Some((_, arguments)) = arguments.split_last() {
            sources.extend(arguments.iter().filter(|s| !is_url(s)).cloned());
        }
    }
    Ok(sources)
}

fn is_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Expands `*` and `?` in the last component of `source`.
fn expand_wildcards(workspace: &Path, source: &str) -> Result<Vec<PathBuf>> {
    let source = paths::context_relative(Path::new(source));
    let Some(pattern) = source.file_name().and_then(|name| name.to_str()) else {
        return Ok(vec![source]);
    };
    if !pattern.contains(['*', '?']) {
        return Ok(vec![source]);
    }

    let parent = source.parent().unwrap_or(Path::new(""));
    let mut matches = Vec::new();
    for entry in WalkDir::new(workspace.join(parent))
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if wildcard_match(pattern, name) {
                matches.push(parent.join(name));
            }
        }
    }
    Ok(matches)
}

/// Matches `value` against a pattern where `*` and `?` do not match `/` and `**` matches any
/// number of path components.
fn wildcard_match(pattern: &str, value: &str) -> bool {
    fn matches(pattern: &[char], value: &[char]) -> bool {
        match pattern {
            [] => value.is_empty(),
            ['*', '*', rest @ ..] => (0..=value.len()).any(|i| matches(rest, &value[i..])),
            ['*', rest @ ..] => (0..=value.len())
                .take_while(|&i| i == 0 || value[i - 1] != '/')
                .any(|i| matches(rest, &value[i..])),
            ['?', rest @ ..] => {
                value.first().is_some_and(|&c| c != '/') && matches(rest, &value[1..])
            }
            [c, rest @ ..] => value.first() == Some(c) && matches(rest, &value[1..]),
        }
    }

    let pattern = pattern.chars().collect::<Vec<_>>();
    let value = value.chars().collect::<Vec<_>>();
    matches(&pattern, &value)
}

/// The subset of `.dockerignore` that matters for change detection: exact paths, directory
/// prefixes, wildcards and `!` exceptions.
struct DockerIgnore {
    patterns: Vec<(bool, String)>,
}

impl DockerIgnore {
    fn load(workspace: &Path) -> Result<Self> {
        let path = workspace.join(".dockerignore");
        if !path.exists() {
            return Ok(Self {
                patterns: Vec::new(),
            });
        }
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    fn parse(contents: &str) -> Self {
        let patterns = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| match line.strip_prefix('!') {
                Some(pattern) => (true, pattern),
                None => (false, line),
            })
            .map(|(negated, pattern)| {
                let pattern = paths::context_relative(Path::new(pattern));
                (negated, pattern.to_string_lossy().into_owned())
            })
            .filter(|(_, pattern)| !pattern.is_empty())
            .collect();
        Self { patterns }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let mut excluded = false;
        for (negated, pattern) in &self.patterns {
            let hit = path
                .ancestors()
                .filter(|ancestor| !ancestor.as_os_str().is_empty())
                .any(|ancestor| wildcard_match(pattern, &ancestor.to_string_lossy()));
            if hit {
                excluded = !negated;
            }
        }
        excluded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temp_path::tmp_path;

    const DOCKERFILE: &str = r#"
FROM golang:1.22 AS builder
# COPY ignored.txt /
COPY go.mod go.sum ./
COPY ["cmd", "/src/cmd"]
ADD --chown=1000:1000 static/*.css /www/
RUN go build \
    -o /out/app \
    ./cmd

FROM scratch
COPY --from=builder /out/app /app
ADD https://example.com/archive.tgz /tmp/
"#;

    #[test]
    fn sources_of_copy_and_add() {
        assert_eq!(
            copied_sources(DOCKERFILE).unwrap(),
            ["go.mod", "go.sum", "cmd", "static/*.css"]
        );
    }

    #[test]
    fn continued_lines_are_joined() {
        let instructions = instructions("RUN a \\\n  b\nCOPY x /\n");
        assert_eq!(instructions, ["RUN a  b", "COPY x /"]);
    }

    #[test]
    fn wildcards() {
        assert!(wildcard_match("*.css", "site.css"));
        assert!(wildcard_match("a?c", "abc"));
        assert!(!wildcard_match("*.css", "site.js"));
        assert!(wildcard_match("*", ""));
        assert!(!wildcard_match("*.md", "docs/NOTES.md"));
        assert!(!wildcard_match("docs?NOTES.md", "docs/NOTES.md"));
        assert!(wildcard_match("**/*.md", "docs/NOTES.md"));
    }

    #[test]
    fn dockerignore_exceptions() {
        let ignore = DockerIgnore::parse("# comment\nlogs\n*.md\n!README.md\n");
        assert!(ignore.is_excluded(Path::new("logs/today.log")));
        assert!(ignore.is_excluded(Path::new("NOTES.md")));
        assert!(!ignore.is_excluded(Path::new("README.md")));
        assert!(!ignore.is_excluded(Path::new("src/main.go")));
        assert!(!ignore.is_excluded(Path::new("docs/NOTES.md")));
    }

    #[test]
    fn dependencies_of_a_workspace() {
        let workspace = tmp_path("kiln-dockerfile-", "");
        for (path, contents) in [
            ("Dockerfile", DOCKERFILE),
            (".dockerignore", "cmd/util\n"),
            ("go.mod", "module app"),
            ("go.sum", ""),
            ("cmd/main.go", "package main"),
            ("cmd/util/util.go", "package util"),
            ("static/a.css", ""),
            ("static/b.css", ""),
            ("static/c.js", ""),
        ] {
            let path = workspace.join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }

        assert_eq!(
            dependencies(&workspace, Path::new("Dockerfile")).unwrap(),
            [
                PathBuf::from("Dockerfile"),
                PathBuf::from("cmd/main.go"),
                PathBuf::from("go.mod"),
                PathBuf::from("go.sum"),
                PathBuf::from("static/a.css"),
                PathBuf::from("static/b.css"),
            ]
        );

        fs::remove_dir_all(&workspace).unwrap();
    }

    #[test]
    fn missing_dockerfile() {
        let workspace = tmp_path("kiln-dockerfile-", "");
        let error = dependencies(&workspace, Path::new("Dockerfile")).unwrap_err();
        assert!(error.to_string().starts_with("failed to read dockerfile"));
    }
}
