use std::sync::{Arc, Mutex};

use cyberlab::console::rules::predicates::*;
use cyberlab::console::*;
use speculate2::speculate;

fn overlapping_table() -> RuleTable {
    RuleTable::new(vec![
        Rule::fixed(
            "narrow",
            cmd("nmap").and(flag("-sV")),
            Response::lines(["PORT   STATE SERVICE VERSION"]),
        )
        .example("nmap -sV 10.0.0.1"),
        Rule::fixed("broad", cmd("nmap"), Response::lines(["PORT   STATE SERVICE"]))
            .example("nmap 10.0.0.1"),
        Rule::render("echo", cmd("echo"), |c| Response::lines([c.args.join(" ")]))
            .example("echo hi"),
        Rule::fixed("clear", cmd("clear"), Response::clear_screen()).example("clear"),
    ])
}

speculate! {
    describe "rule tables" {
        before {
            let table = overlapping_table();
        }

        it "return the earlier rule when two predicates match" {
            let cmd = Command::parse("nmap -sV 10.0.0.1").unwrap();
            assert!(table.rules()[1].when.matches(&cmd));
            assert_eq!(table.matching_rule(&cmd).map(|(i, _)| i), Some(0));
        }

        it "are deterministic" {
            for input in ["nmap -sV 10.0.0.1", "echo a b", "whoami"] {
                assert_eq!(table.resolve_input(input), table.resolve_input(input));
            }
        }

        it "fall back to command not found" {
            let response = table.resolve_input("sqlmap -u x").unwrap();
            assert!(response.is_error);
            assert_eq!(response.lines[0], "sqlmap: command not found");
        }

        it "flag a broad rule listed before a narrow one" {
            let mut rules = overlapping_table().rules().to_vec();
            rules.swap(0, 1);
            let shadowed = RuleTable::new(rules).shadowed_rules();
            assert_eq!(
                shadowed,
                vec![ShadowedRule {
                    label: "narrow",
                    example: "nmap -sV 10.0.0.1",
                    resolved_to: Some("broad"),
                }]
            );
        }
    }

    describe "the interpreter" {
        before {
            let heard = Arc::new(Mutex::new(Vec::<String>::new()));
            let mut shell = Interpreter::new(overlapping_table(), vec!["nmap", "echo", "clear"]);
            let sink = heard.clone();
            shell.subscribe(move |line| sink.lock().unwrap().push(line.to_string()));
        }

        it "ignores blank input entirely" {
            assert_eq!(shell.submit("   "), Submission::Ignored);
            assert!(shell.entries().is_empty());
            assert!(shell.submitted().is_empty());
            assert!(heard.lock().unwrap().is_empty());
        }

        it "records output and tells listeners the trimmed line" {
            shell.submit("  echo hello  ");
            assert_eq!(shell.entries().len(), 1);
            assert_eq!(shell.entries()[0].response.lines, vec!["hello"]);
            assert_eq!(*heard.lock().unwrap(), vec!["echo hello".to_string()]);
        }

        it "wipes the display on clear but keeps recall history" {
            shell.submit("nmap 10.0.0.1");
            assert_eq!(shell.submit("clear"), Submission::Cleared);
            assert!(shell.entries().is_empty());
            assert_eq!(shell.submitted().len(), 2);
            assert_eq!(heard.lock().unwrap().len(), 1);
        }

        it "walks history back and forth within bounds" {
            shell.submit("echo one");
            shell.submit("echo two");

            assert_eq!(shell.history_back(), "echo two");
            assert_eq!(shell.history_back(), "echo one");
            assert_eq!(shell.history_back(), "echo one");
            assert_eq!(shell.history_forward(), "echo two");
            assert_eq!(shell.history_forward(), "");
        }

        it "suggests completions only for single words of two or more characters" {
            assert_eq!(shell.suggest("nm"), Some("ap"));
            assert_eq!(shell.suggest("n"), None);
            assert_eq!(shell.suggest("nmap"), None);
            assert_eq!(shell.suggest("nmap -"), None);
            assert_eq!(shell.accept_suggestion("ec"), Some("echo".to_string()));
        }

        it "accepts a suggestion as the real command name whatever the case typed" {
            assert_eq!(shell.suggest("NM"), Some("ap"));
            assert_eq!(shell.accept_suggestion("NM"), Some("nmap".to_string()));
        }
    }
}
