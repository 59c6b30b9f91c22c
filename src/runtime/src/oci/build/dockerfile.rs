//! Dockerfile parser.
//!
//! Reads back the build manifests rendered by [`super::template`] so their
//! structure can be checked before a workspace is handed to the toolchain.
//! Understands line continuations (`\`), comments, multi-stage `FROM ... AS`
//! and the exec (JSON) form of ENTRYPOINT.

use kiln_core::error::{KilnError, Result};

/// A single Dockerfile instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// `FROM <image> [AS <alias>]`
    From {
        image: String,
        alias: Option<String>,
    },
    /// `RUN <command>` (shell form)
    Run { command: String },
    /// `COPY [--from=<stage>] <src>... <dst>`
    Copy {
        src: Vec<String>,
        dst: String,
        from: Option<String>,
    },
    /// `WORKDIR <path>`
    Workdir { path: String },
    /// `ENTRYPOINT ["exec", "form"]`
    Entrypoint { exec: Vec<String> },
}

/// Parsed Dockerfile: a list of instructions in order.
#[derive(Debug, Clone)]
pub struct Dockerfile {
    pub instructions: Vec<Instruction>,
}

impl Dockerfile {
    /// Parse a Dockerfile from its text content.
    ///
    /// Besides per-line syntax this checks that the file starts with FROM and
    /// that every `COPY --from` names a stage declared earlier.
    pub fn parse(content: &str) -> Result<Self> {
        let mut instructions = Vec::new();

        for (line_num, line) in join_continuation_lines(content).iter().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            instructions.push(parse_instruction(trimmed, line_num + 1)?);
        }

        if !matches!(instructions.first(), Some(Instruction::From { .. })) {
            return Err(KilnError::ManifestWrite(
                "first instruction must be FROM".to_string(),
            ));
        }

        let mut stages: Vec<&str> = Vec::new();
        for instruction in &instructions {
            match instruction {
                Instruction::From { alias: Some(alias), .. } => stages.push(alias),
                Instruction::Copy { from: Some(from), .. } if !stages.contains(&from.as_str()) => {
                    return Err(KilnError::ManifestWrite(format!(
                        "COPY --from={} references an undeclared stage",
                        from
                    )));
                }
                _ => {}
            }
        }

        Ok(Dockerfile { instructions })
    }

    /// Number of build stages (FROM instructions).
    pub fn stage_count(&self) -> usize {
        self.instructions
            .iter()
            .filter(|i| matches!(i, Instruction::From { .. }))
            .count()
    }

    /// Commands of all RUN instructions, in order.
    pub fn run_commands(&self) -> Vec<&str> {
        self.instructions
            .iter()
            .filter_map(|i| match i {
                Instruction::Run { command } => Some(command.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The last ENTRYPOINT, which is the one the image ends up with.
    pub fn entrypoint(&self) -> Option<&[String]> {
        self.instructions.iter().rev().find_map(|i| match i {
            Instruction::Entrypoint { exec } => Some(exec.as_slice()),
            _ => None,
        })
    }
}

/// Join lines ending with `\` into single logical lines.
fn join_continuation_lines(content: &str) -> Vec<String> {
    let mut logical_lines = Vec::new();
    let mut current = String::new();

    for line in content.lines() {
        if let Some(stripped) = line.strip_suffix('\\') {
            current.push_str(stripped.trim_end());
            current.push(' ');
        } else {
            current.push_str(line);
            logical_lines.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        logical_lines.push(current);
    }

    logical_lines
}

/// Parse a single logical line into an Instruction.
fn parse_instruction(line: &str, line_num: usize) -> Result<Instruction> {
    let (keyword, rest) = split_first_word(line);
    if rest.is_empty() {
        return Err(KilnError::ManifestWrite(format!(
            "Line {}: {} requires an argument",
            line_num,
            keyword.to_uppercase()
        )));
    }

    match keyword.to_uppercase().as_str() {
        "FROM" => Ok(parse_from(rest)),
        "RUN" => Ok(Instruction::Run {
            command: rest.to_string(),
        }),
        "COPY" => parse_copy(rest, line_num),
        "WORKDIR" => Ok(Instruction::Workdir {
            path: rest.to_string(),
        }),
        "ENTRYPOINT" => Ok(Instruction::Entrypoint {
            exec: parse_exec(rest, line_num)?,
        }),
        _ => Err(KilnError::ManifestWrite(format!(
            "Line {}: Unknown instruction '{}'",
            line_num, keyword
        ))),
    }
}

/// Split a string into the first word and the rest.
fn split_first_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim_start()),
        None => (s, ""),
    }
}

fn parse_from(rest: &str) -> Instruction {
    let parts: Vec<&str> = rest.split_whitespace().collect();
    let alias = match parts.as_slice() {
        [_, as_kw, alias] if as_kw.eq_ignore_ascii_case("AS") => Some(alias.to_string()),
        _ => None,
    };
    Instruction::From {
        image: parts[0].to_string(),
        alias,
    }
}

fn parse_copy(rest: &str, line_num: usize) -> Result<Instruction> {
    let (from, remaining) = match rest.strip_prefix("--from=") {
        Some(after) => {
            let (stage, remaining) = split_first_word(after);
            (Some(stage.to_string()), remaining)
        }
        None => (None, rest),
    };

    let parts: Vec<&str> = remaining.split_whitespace().collect();
    match parts.split_last() {
        Some((dst, src)) if !src.is_empty() => Ok(Instruction::Copy {
            src: src.iter().map(|s| s.to_string()).collect(),
            dst: dst.to_string(),
            from,
        }),
        _ => Err(KilnError::ManifestWrite(format!(
            "Line {}: COPY requires at least one source and a destination",
            line_num
        ))),
    }
}

/// Parse the exec form `["a", "b"]`.
fn parse_exec(rest: &str, line_num: usize) -> Result<Vec<String>> {
    serde_json::from_str(rest).map_err(|e| {
        KilnError::ManifestWrite(format!(
            "Line {}: ENTRYPOINT must be a JSON array, got '{}': {}",
            line_num, rest, e
        ))
    })
}
