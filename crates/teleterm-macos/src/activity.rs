//! Advisory activity labels for listed windows: `idle` when a shell prompt is
//! on screen, otherwise the newest process running under the window's app.

use std::collections::HashMap;

/// Lines inspected from the bottom of the captured text.
const PROMPT_SCAN_LINES: usize = 10;

const PROMPT_GLYPHS: &[char] = &['$', '#', '%', '>', '\u{276F}', '\u{00BB}'];

pub const IDLE_LABEL: &str = "idle";

/// One entry from `ps -eo pid=,ppid=,args=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    pub args: String,
}

impl ProcessInfo {
    /// Executable basename from argv[0].
    pub fn command_name(&self) -> &str {
        let argv0 = self.args.split_whitespace().next().unwrap_or_default();
        argv0.rsplit('/').next().unwrap_or(argv0).trim_start_matches('-')
    }
}

/// Snapshot of all running processes on the host, keyed by PID.
pub type ProcessMap = HashMap<u32, ProcessInfo>;

/// Scan all running processes. Returns an empty map on failure.
pub fn scan_all_processes() -> ProcessMap {
    let output = match std::process::Command::new("ps")
        .args(["-eo", "pid=,ppid=,args="])
        .output()
    {
        Ok(o) => o,
        Err(e) => {
            tracing::debug!(error = %e, "ps unavailable; no activity labels");
            return ProcessMap::new();
        }
    };
    parse_ps_output(&String::from_utf8_lossy(&output.stdout))
}

pub fn parse_ps_output(output: &str) -> ProcessMap {
    output
        .lines()
        .filter_map(parse_ps_line)
        .map(|info| (info.pid, info))
        .collect()
}

fn parse_ps_line(line: &str) -> Option<ProcessInfo> {
    let (pid, rest) = line.trim().split_once(char::is_whitespace)?;
    let rest = rest.trim_start();
    let (ppid, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    Some(ProcessInfo {
        pid: pid.parse().ok()?,
        ppid: ppid.parse().ok()?,
        args: args.trim().to_string(),
    })
}

/// Most recently spawned descendant of `root`, taken as the highest pid.
pub fn newest_descendant(map: &ProcessMap, root: u32) -> Option<&ProcessInfo> {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for info in map.values() {
        if info.pid != info.ppid {
            children.entry(info.ppid).or_default().push(info.pid);
        }
    }
    let mut newest: Option<u32> = None;
    let mut stack = vec![root];
    let mut seen = 0usize;
    while let Some(pid) = stack.pop() {
        seen += 1;
        if seen > map.len() + 1 {
            break;
        }
        for &child in children.get(&pid).map(Vec::as_slice).unwrap_or_default() {
            newest = Some(newest.map_or(child, |n| n.max(child)));
            stack.push(child);
        }
    }
    newest.and_then(|pid| map.get(&pid))
}

fn is_spacing(c: char) -> bool {
    c == ' ' || c == '\u{00A0}'
}

fn strip_one(s: &str, at_end: bool) -> &str {
    let stripped = if at_end {
        s.strip_suffix(is_spacing)
    } else {
        s.strip_prefix(is_spacing)
    };
    stripped.unwrap_or(s)
}

fn is_prompt_line(line: &str) -> bool {
    let tail = strip_one(line, true);
    if tail.ends_with(PROMPT_GLYPHS) {
        return true;
    }
    let mut head = strip_one(line, false).chars();
    matches!(
        (head.next(), head.next()),
        (Some(g), Some(next)) if PROMPT_GLYPHS.contains(&g) && is_spacing(next)
    )
}

/// Whether a shell prompt shows in the last few non-empty lines of `text`.
pub fn shows_prompt(text: &str) -> bool {
    text.lines()
        .rev()
        .filter(|l| !l.trim().is_empty())
        .take(PROMPT_SCAN_LINES)
        .any(|l| is_prompt_line(l.trim_end_matches(['\r', '\t'])))
}

/// Label for a window: `idle` if its text shows a prompt, else the newest
/// descendant's command name.
pub fn activity_label(text: Option<&str>, owner_pid: u32, processes: &ProcessMap) -> Option<String> {
    if text.is_some_and(shows_prompt) {
        return Some(IDLE_LABEL.to_string());
    }
    newest_descendant(processes, owner_pid).map(|p| p.command_name().to_string())
}
