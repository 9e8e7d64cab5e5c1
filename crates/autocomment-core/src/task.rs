use std::fmt;
use std::str::FromStr;

/// What the model is asked to do with each source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Task {
    /// Rewrite the file with comments added.
    #[default]
    Comment,
    FindBugs,
    Review,
    Explain,
    Optimize,
}

impl Task {
    pub const ALL: [Task; 5] = [
        Task::Comment,
        Task::FindBugs,
        Task::Review,
        Task::Explain,
        Task::Optimize,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Task::Comment => "comment",
            Task::FindBugs => "find-bugs",
            Task::Review => "review",
            Task::Explain => "explain",
            Task::Optimize => "optimize",
        }
    }

    /// Report tasks produce Markdown about the file instead of a new version of it.
    pub fn produces_report(self) -> bool {
        !matches!(self, Task::Comment)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Task::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| {
                let names: Vec<&str> = Task::ALL.iter().map(|t| t.as_str()).collect();
                format!("unknown task '{s}', expected one of: {}", names.join(", "))
            })
    }
}
