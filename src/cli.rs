use crate::error::UsageError;
use crate::types::{FormatSpec, PageContext, VERSION};

pub fn get_program_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
        .unwrap_or_else(|| "copytab".to_string())
        .to_lowercase()
        .replace(".exe", "")
}

pub fn print_help() {
    let prog = get_program_name();
    println!(r#"{prog} - copy a page's title and URL in preset and custom formats

USAGE:
    {prog} [-v] <COMMAND> [OPTIONS]

COMMANDS:
    list                    List enabled presets in display order
        --all               Also list disabled presets
    copy <id>               Print the text a preset produces
        --title <text>      Page title
        --url <url>         Page URL
        --selected <text>   Selected text on the page
    format                  Run an ad-hoc format
        --template <tpl>    Template with {{title}} {{url}} {{domain}} {{path}} {{selectedText}} {{js}}
        --search <pat>      Search pattern: /regex/flags or literal text
                            (no lookaround or backreferences such as (?=x) or \1)
        --replace <text>    Replacement ($1, $&, $<name>, $$ ...)
        --script <src>      Expression whose value fills {{js}}
        --title, --url, --selected as for copy
    eval <source>           Print the value of an expression
        --title, --url, --selected (optional)
    add-format              Save a custom format
        --name <name>       Button label
        --template, --search, --replace, --script as for format
    remove-format <id>      Delete a custom format
    toggle <id>             Enable or disable a preset
    order <id,id,...>       Set the display order
    help                    Show this help message
    version                 Show version information

OPTIONS:
    -v, --verbose       Debug logging on stderr
    -h, --help          Show this help message
    -V, --version       Show version information

ENVIRONMENT VARIABLES:
    COPYTAB_CONFIG      Settings file (default: <config dir>/copytab/settings.json)
    COPYTAB_LOG         Log level (error, warn, info, debug, trace)

EXAMPLES:
    {prog} copy markdown-format --title "Rust" --url https://www.rust-lang.org/
    {prog} format --template "{{title}} ({{domain}})" --title Example --url https://example.com/a
    {prog} eval "if (url.includes('github')) ? 'GitHub' : domain" --url https://github.com/x
    {prog} add-format --name "Short" --template "{{js}}" --script "title.substring(0,20)"
"#, prog = prog);
}

pub fn print_version() {
    let prog = get_program_name();
    println!("{} {}", prog, VERSION);
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub verbose: bool,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Version,
    List { all: bool },
    Copy { id: String, page: PageContext },
    Format { spec: FormatSpec, page: PageContext },
    Eval { source: String, page: PageContext },
    /// The id is left empty; the caller assigns one when saving.
    AddFormat { spec: FormatSpec },
    RemoveFormat { id: String },
    Toggle { id: String },
    Order { ids: Vec<String> },
}

const PAGE_OPTS: &[&str] = &["--title", "--url", "--selected"];
const FORMAT_OPTS: &[&str] = &["--template", "--search", "--replace", "--script"];

/// Options and positionals following a command name.
#[derive(Debug, Default)]
struct Parsed {
    values: Vec<(String, String)>,
    switches: Vec<String>,
    positionals: Vec<String>,
}

impl Parsed {
    fn value(&self, opt: &str) -> Option<&str> {
        // last occurrence wins
        self.values.iter().rev().find(|(k, _)| k == opt).map(|(_, v)| v.as_str())
    }

    fn owned(&self, opt: &str) -> String {
        self.value(opt).unwrap_or_default().to_string()
    }

    fn has(&self, switch: &str) -> bool {
        self.switches.iter().any(|s| s == switch)
    }

    fn require(&self, opt: &str, what: &'static str) -> Result<String, UsageError> {
        self.value(opt).map(str::to_string).ok_or(UsageError::Missing(what))
    }

    /// Exactly one positional argument.
    fn single(&self, what: &'static str) -> Result<String, UsageError> {
        match self.positionals.as_slice() {
            [one] => Ok(one.clone()),
            [] => Err(UsageError::Missing(what)),
            [_, extra, ..] => Err(UsageError::Unexpected(extra.clone())),
        }
    }

    fn no_positionals(&self) -> Result<(), UsageError> {
        match self.positionals.first() {
            Some(p) => Err(UsageError::Unexpected(p.clone())),
            None => Ok(()),
        }
    }

    fn page(&self, required: bool) -> Result<PageContext, UsageError> {
        let (title, url) = if required {
            (self.require("--title", "--title")?, self.require("--url", "--url")?)
        } else {
            (self.owned("--title"), self.owned("--url"))
        };
        let mut page = PageContext::new(title, url);
        if let Some(sel) = self.value("--selected") {
            page = page.with_selection(sel);
        }
        Ok(page)
    }

    fn spec(&self, name: String) -> Result<FormatSpec, UsageError> {
        Ok(FormatSpec {
            id: String::new(),
            name,
            template: self.require("--template", "--template")?,
            search_pattern: self.owned("--search"),
            replace_pattern: self.owned("--replace"),
            script_source: self.owned("--script"),
        })
    }
}

fn parse_options(args: &[String], valued: &[&[&str]], switches: &[&str]) -> Result<Parsed, UsageError> {
    let mut parsed = Parsed::default();
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        if valued.iter().any(|set| set.contains(&arg)) {
            let value = args.get(i + 1).ok_or_else(|| UsageError::MissingValue(arg.to_string()))?;
            parsed.values.push((arg.to_string(), value.clone()));
            i += 2;
            continue;
        }
        if switches.contains(&arg) {
            parsed.switches.push(arg.to_string());
        } else if arg.starts_with("--") && arg.len() > 2 {
            return Err(UsageError::UnknownOption(arg.to_string()));
        } else {
            parsed.positionals.push(arg.to_string());
        }
        i += 1;
    }
    Ok(parsed)
}

/// Parse arguments after the program name.
pub fn parse_args(args: &[String]) -> Result<Invocation, UsageError> {
    let mut verbose = false;
    let mut rest = args;
    while let Some(first) = rest.first() {
        match first.as_str() {
            "-v" | "--verbose" => verbose = true,
            _ => break,
        }
        rest = &rest[1..];
    }
    let (cmd, opts) = match rest.split_first() {
        Some((cmd, opts)) => (cmd.as_str(), opts),
        None => return Err(UsageError::MissingCommand),
    };

    let command = match cmd {
        "-h" | "--help" | "help" => Command::Help,
        "-V" | "--version" | "version" => Command::Version,
        "list" | "ls" => {
            let p = parse_options(opts, &[], &["--all"])?;
            p.no_positionals()?;
            Command::List { all: p.has("--all") }
        }
        "copy" => {
            let p = parse_options(opts, &[PAGE_OPTS], &[])?;
            Command::Copy { id: p.single("preset id")?, page: p.page(true)? }
        }
        "format" => {
            let p = parse_options(opts, &[PAGE_OPTS, FORMAT_OPTS], &[])?;
            p.no_positionals()?;
            Command::Format { spec: p.spec("ad-hoc".to_string())?, page: p.page(true)? }
        }
        "eval" => {
            let p = parse_options(opts, &[PAGE_OPTS], &[])?;
            Command::Eval { source: p.single("expression")?, page: p.page(false)? }
        }
        "add-format" => {
            let p = parse_options(opts, &[FORMAT_OPTS, &["--name"]], &[])?;
            p.no_positionals()?;
            Command::AddFormat { spec: p.spec(p.require("--name", "--name")?)? }
        }
        "remove-format" => {
            let p = parse_options(opts, &[], &[])?;
            Command::RemoveFormat { id: p.single("format id")? }
        }
        "toggle" => {
            let p = parse_options(opts, &[], &[])?;
            Command::Toggle { id: p.single("preset id")? }
        }
        "order" => {
            let p = parse_options(opts, &[], &[])?;
            let ids = p.single("preset ids")?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            Command::Order { ids }
        }
        other => return Err(UsageError::UnknownCommand(other.to_string())),
    };
    Ok(Invocation { verbose, command })
}

/// Id for a newly added custom format: the current time in milliseconds.
pub fn new_format_id() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Result<Invocation, UsageError> {
        let owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        parse_args(&owned)
    }

    fn command(args: &[&str]) -> Command {
        parse(args).unwrap().command
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(command(&["--help"]), Command::Help);
        assert_eq!(command(&["help"]), Command::Help);
        assert_eq!(command(&["-V"]), Command::Version);
        assert_eq!(parse(&[]), Err(UsageError::MissingCommand));
    }

    #[test]
    fn test_verbose_prefix() {
        let inv = parse(&["-v", "list", "--all"]).unwrap();
        assert!(inv.verbose);
        assert_eq!(inv.command, Command::List { all: true });
        assert!(!parse(&["list"]).unwrap().verbose);
    }

    #[test]
    fn test_copy() {
        let cmd = command(&["copy", "markdown-format", "--title", "T", "--url", "https://e.test/", "--selected", "s"]);
        assert_eq!(cmd, Command::Copy {
            id: "markdown-format".into(),
            page: PageContext::new("T", "https://e.test/").with_selection("s"),
        });
        assert_eq!(parse(&["copy", "x", "--title", "T"]), Err(UsageError::Missing("--url")));
        assert_eq!(parse(&["copy", "--title", "T", "--url", "u"]), Err(UsageError::Missing("preset id")));
        assert_eq!(parse(&["copy", "x", "--title"]), Err(UsageError::MissingValue("--title".into())));
    }

    #[test]
    fn test_format() {
        let cmd = command(&[
            "format", "--template", "{title}|{js}", "--script", "upper(title)",
            "--search", "/a/g", "--replace", "b", "--title", "T", "--url", "u",
        ]);
        let Command::Format { spec, page } = cmd else { panic!("expected format") };
        assert_eq!(spec.template, "{title}|{js}");
        assert_eq!(spec.search_pattern, "/a/g");
        assert_eq!(spec.replace_pattern, "b");
        assert_eq!(spec.script_source, "upper(title)");
        assert_eq!(page, PageContext::new("T", "u"));
    }

    #[test]
    fn test_eval_page_optional() {
        assert_eq!(command(&["eval", "1 + 2"]), Command::Eval { source: "1 + 2".into(), page: PageContext::new("", "") });
    }

    #[test]
    fn test_add_format_and_management() {
        let Command::AddFormat { spec } = command(&["add-format", "--name", "N", "--template", "{url}"]) else {
            panic!("expected add-format")
        };
        assert_eq!(spec, FormatSpec::template("", "N", "{url}"));
        assert_eq!(parse(&["add-format", "--template", "{url}"]), Err(UsageError::Missing("--name")));
        assert_eq!(command(&["toggle", "html-format"]), Command::Toggle { id: "html-format".into() });
        assert_eq!(command(&["remove-format", "17"]), Command::RemoveFormat { id: "17".into() });
        assert_eq!(
            command(&["order", "html-format, markdown-format,"]),
            Command::Order { ids: vec!["html-format".into(), "markdown-format".into()] }
        );
    }

    #[test]
    fn test_rejects_unknown() {
        assert_eq!(parse(&["paste"]), Err(UsageError::UnknownCommand("paste".into())));
        assert_eq!(parse(&["list", "--colour"]), Err(UsageError::UnknownOption("--colour".into())));
        assert_eq!(parse(&["toggle", "a", "b"]), Err(UsageError::Unexpected("b".into())));
    }

    #[test]
    fn test_new_format_id_is_millis() {
        let id = new_format_id();
        assert!(id.len() >= 13 && id.bytes().all(|b| b.is_ascii_digit()), "{id}");
    }
}
