#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub usage: &'static str,
    pub summary: &'static str,
}

pub(crate) const SESSION_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "services",
        usage: "/services",
        summary: "reload the service catalog",
    },
    CommandSpec {
        command: "open",
        usage: "/open <name|index>",
        summary: "open (or switch to) the card for a service",
    },
    CommandSpec {
        command: "cards",
        usage: "/cards",
        summary: "list open cards and their state",
    },
    CommandSpec {
        command: "form",
        usage: "/form",
        summary: "show the active card's form",
    },
    CommandSpec {
        command: "set",
        usage: "/set <row> <value>",
        summary: "type a value into a text or number row",
    },
    CommandSpec {
        command: "file",
        usage: "/file <row> <path>",
        summary: "choose a file for a filepath row",
    },
    CommandSpec {
        command: "submit",
        usage: "/submit",
        summary: "execute the active card",
    },
    CommandSpec {
        command: "wait",
        usage: "/wait",
        summary: "block until in-flight executions answer",
    },
    CommandSpec {
        command: "results",
        usage: "/results",
        summary: "show the active card's results",
    },
    CommandSpec {
        command: "download",
        usage: "/download <n>",
        summary: "fetch a linked result into the output directory",
    },
    CommandSpec {
        command: "health",
        usage: "/health",
        summary: "ask the backend whether the active service is up",
    },
    CommandSpec {
        command: "help",
        usage: "/help",
        summary: "show this list",
    },
    CommandSpec {
        command: "quit",
        usage: "/quit",
        summary: "leave the session",
    },
];

pub const SESSION_HELP_COMMANDS: &[&str] = &[
    "/services",
    "/open",
    "/cards",
    "/form",
    "/set",
    "/file",
    "/submit",
    "/wait",
    "/results",
    "/download",
    "/health",
    "/help",
    "/quit",
];

pub fn help_lines() -> Vec<String> {
    let width = SESSION_COMMANDS
        .iter()
        .map(|spec| spec.usage.len())
        .max()
        .unwrap_or(0);
    SESSION_COMMANDS
        .iter()
        .map(|spec| format!("{:width$}  {}", spec.usage, spec.summary))
        .collect()
}
