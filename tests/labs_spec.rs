use cyberlab::console::Command;
use cyberlab::labs::{self, Lab, REGISTRY};
use cyberlab::missions::{EventKind, MissionTracker, StepEvent, Transition};
use speculate2::speculate;

fn all_labs() -> Vec<Lab> {
    REGISTRY
        .iter()
        .map(|meta| Lab::load(meta.id).expect("lab loads"))
        .collect()
}

fn label_for(lab: &Lab, input: &str) -> Option<&'static str> {
    let cmd = Command::parse(input)?;
    lab.rules.matching_rule(&cmd).map(|(_, rule)| rule.label)
}

speculate! {
    describe "every lab" {
        it "has no unreachable rules" {
            for lab in all_labs() {
                let shadowed = lab.rules.shadowed_rules();
                assert!(shadowed.is_empty(), "{}: {:?}", lab.meta.slug, shadowed);
            }
        }

        it "has no unreachable search rules" {
            for lab in all_labs() {
                if let Some(search) = &lab.search {
                    let shadowed = search.shadowed_rules();
                    assert!(shadowed.is_empty(), "{}: {:?}", lab.meta.slug, shadowed);
                }
            }
        }

        it "answers every command its autocomplete offers" {
            for lab in all_labs() {
                for word in &lab.vocabulary {
                    assert!(label_for(&lab, word).is_some(), "{}: {}", lab.meta.slug, word);
                }
            }
        }

        it "ends its table with the clear sentinel reachable" {
            for lab in all_labs() {
                let response = lab.rules.resolve_input("clear").expect("non-blank");
                assert!(response.is_clear_screen(), "{}", lab.meta.slug);
            }
        }

        it "numbers its steps 1 through total_steps" {
            for lab in all_labs() {
                let ids: Vec<u32> = lab.steps.ids().collect();
                let expected: Vec<u32> = (1..=lab.meta.total_steps).collect();
                assert_eq!(ids, expected, "{}", lab.meta.slug);
            }
        }

        it "can be finished by replaying each step's solution in order" {
            for lab in all_labs() {
                let mut tracker = MissionTracker::new(lab.meta.id, lab.steps.clone());
                let mut finished = 0;

                for step in lab.steps.iter() {
                    let transition = tracker.handle(&step.solution_event());
                    assert_eq!(
                        transition.completed_step(),
                        Some(step.id),
                        "{} step {} solution {:?}",
                        lab.meta.slug,
                        step.id,
                        step.solution
                    );
                    if transition.is_lab_completed() {
                        finished += 1;
                    }
                }

                assert!(tracker.all_complete(), "{}", lab.meta.slug);
                assert_eq!(finished, 1, "{}", lab.meta.slug);
            }
        }

        it "understands the console solutions it teaches" {
            for lab in all_labs() {
                for step in lab.steps.iter().filter(|s| s.listens_to == EventKind::Command) {
                    assert!(
                        label_for(&lab, step.solution).is_some(),
                        "{} step {}: {:?}",
                        lab.meta.slug,
                        step.id,
                        step.solution
                    );
                }
            }
        }

        it "resolves deterministically" {
            for lab in all_labs() {
                for rule in lab.rules.rules() {
                    if let Some(example) = rule.example {
                        assert_eq!(
                            lab.rules.resolve_input(example),
                            lab.rules.resolve_input(example),
                            "{}: {}",
                            lab.meta.slug,
                            example
                        );
                    }
                }
            }
        }
    }

    describe "recon" {
        before {
            let lab = Lab::load(1).expect("lab loads");
        }

        it "answers whoami with the student account" {
            let response = lab.rules.resolve_input("whoami").expect("non-blank");
            assert_eq!(response.lines.first().map(String::as_str), Some("student"));
            assert!(!response.is_error);
        }

        it "completes step 1 on whoami" {
            let mut tracker = MissionTracker::new(1, lab.steps.clone());
            assert_eq!(
                tracker.handle(&StepEvent::Command("whoami".into())),
                Transition::StepCompleted { step: 1 }
            );
        }

        it "reports unknown commands as an error response" {
            let response = lab.rules.resolve_input("sudo su").expect("non-blank");
            assert!(response.is_error);
            assert_eq!(response.lines[0], "sudo: command not found");
        }

        it "reveals the flag only through the precise dork" {
            let search = lab.search.as_ref().expect("recon has a search page");
            let flag = lab.flag.expect("recon has a flag");
            let cmd = Command::parse("site:evilcorp.com inurl:admin").expect("non-blank");
            let (_, rule) = search.matching_rule(&cmd).expect("always answers");
            assert_eq!(rule.label, flag.revealed_by);

            let cmd = Command::parse("admin login").expect("non-blank");
            let (_, rule) = search.matching_rule(&cmd).expect("always answers");
            assert_ne!(rule.label, flag.revealed_by);
        }
    }

    describe "scanning" {
        before {
            let lab = Lab::load(2).expect("lab loads");
        }

        it "routes -sV to version detection, not the default scan" {
            assert_eq!(label_for(&lab, "nmap -sV 192.168.1.5"), Some("nmap-version"));
            assert_eq!(label_for(&lab, "nmap 192.168.1.5"), Some("nmap-default"));
        }

        it "lists version detection ahead of the default scan" {
            let position = |label: &str| lab.rules.rules().iter().position(|r| r.label == label);
            assert!(position("nmap-version") < position("nmap-default"));
            assert!(position("nmap-default").is_some());
        }

        it "completes step 2 on -sV without touching step 1" {
            let mut tracker = MissionTracker::new(2, lab.steps.clone());
            assert_eq!(
                tracker.handle(&StepEvent::Command("nmap -sV 192.168.1.5".into())),
                Transition::StepCompleted { step: 2 }
            );
            assert!(!tracker.is_completed(1));
            assert_eq!(tracker.current_step_id(), Some(1));
        }
    }

    describe "the registry" {
        it "unlocks in catalogue order with rising difficulty points" {
            let points: Vec<u32> = REGISTRY.iter().map(|m| m.points).collect();
            assert_eq!(points, vec![100, 150, 175, 200, 250]);
            assert_eq!(labs::total_points(), 875);
        }
    }
}
