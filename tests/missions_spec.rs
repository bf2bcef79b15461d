use cyberlab::console::rules::predicates::*;
use cyberlab::missions::*;
use speculate2::speculate;

fn three_steps() -> StepSet {
    StepSet::new(vec![
        Step::on_command(1, cmd("whoami")).solution("whoami"),
        Step::on_command(2, cmd("ls").and(flag("-la"))).solution("ls -la"),
        Step::on_command(3, cmd("ls")).solution("ls"),
    ])
    .expect("valid step set")
}

fn command(text: &str) -> StepEvent {
    StepEvent::Command(text.to_string())
}

speculate! {
    before {
        let mut tracker = MissionTracker::new(7, three_steps());
    }

    describe "a fresh tracker" {
        it "points at the first step" {
            assert_eq!(tracker.current_step_id(), Some(1));
            assert_eq!(tracker.completed_count(), 0);
            assert!(!tracker.all_complete());
            assert!(tracker.completed_at().is_none());
        }
    }

    describe "handle" {
        it "completes the first incomplete step the event satisfies" {
            // `ls -la` satisfies both 2 and 3; the earlier one wins.
            assert_eq!(tracker.handle(&command("ls -la")), Transition::StepCompleted { step: 2 });
            assert_eq!(tracker.handle(&command("ls -la")), Transition::StepCompleted { step: 3 });
            assert_eq!(tracker.current_step_id(), Some(1));
        }

        it "ignores events nobody listens for" {
            assert_eq!(tracker.handle(&command("pwd")), Transition::Unchanged);
            assert_eq!(tracker.handle(&StepEvent::Search("whoami".into())), Transition::Unchanged);
            assert_eq!(tracker.handle(&StepEvent::FlagCaptured), Transition::Unchanged);
        }

        it "never shrinks the completed set" {
            let mut sizes = Vec::new();
            for input in ["whoami", "pwd", "whoami", "ls", "ls -la", "cat x"] {
                tracker.handle(&command(input));
                sizes.push(tracker.completed_count());
            }
            assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
            assert_eq!(sizes.last(), Some(&3));
        }
    }

    describe "complete_step" {
        it "is idempotent" {
            assert_eq!(tracker.complete_step(2), Transition::StepCompleted { step: 2 });
            let once = tracker.completed_steps().clone();
            assert_eq!(tracker.complete_step(2), Transition::Unchanged);
            assert_eq!(tracker.completed_steps(), &once);
        }

        it "ignores ids outside the lab" {
            assert_eq!(tracker.complete_step(99), Transition::Unchanged);
            assert_eq!(tracker.completed_count(), 0);
        }

        it "signals lab completion exactly once on the last step" {
            let transitions: Vec<Transition> = [3, 1, 2, 2, 1]
                .into_iter()
                .map(|id| tracker.complete_step(id))
                .collect();

            let signals = transitions.iter().filter(|t| t.is_lab_completed()).count();
            assert_eq!(signals, 1);
            assert!(transitions[2].is_lab_completed());
            assert_eq!(transitions[2].completed_step(), Some(2));
            assert!(tracker.all_complete());
            assert_eq!(tracker.current_step_id(), None);
            assert!(tracker.completed_at().is_some());
        }
    }

    describe "reset" {
        it "starts a new cycle that signals again" {
            for id in 1..=3 {
                tracker.complete_step(id);
            }
            tracker.reset();
            assert_eq!(tracker.completed_count(), 0);
            assert!(tracker.completed_at().is_none());

            tracker.complete_step(1);
            tracker.complete_step(2);
            assert!(tracker.complete_step(3).is_lab_completed());
        }
    }

    describe "restore" {
        it "loads saved steps without signalling" {
            tracker.restore([1, 3, 42], None);
            assert_eq!(tracker.completed_count(), 2);
            assert_eq!(tracker.current_step_id(), Some(2));
            assert!(tracker.complete_step(2).is_lab_completed());
        }

        it "keeps a restored full set complete" {
            tracker.restore([1, 2, 3], None);
            assert!(tracker.all_complete());
            assert!(tracker.completed_at().is_some());
            assert_eq!(tracker.complete_step(3), Transition::Unchanged);
        }
    }

    describe "step sets" {
        it "reject duplicates and descending ids" {
            let dup = StepSet::new(vec![
                Step::on_command(1, always()),
                Step::on_command(1, always()),
            ]);
            assert_eq!(dup.unwrap_err(), StepSetError::Duplicate(1));

            let backwards = StepSet::new(vec![
                Step::on_command(2, always()),
                Step::on_command(1, always()),
            ]);
            assert_eq!(backwards.unwrap_err(), StepSetError::OutOfOrder { previous: 2, id: 1 });

            assert_eq!(StepSet::new(vec![]).unwrap_err(), StepSetError::Empty);
        }

        it "replay their own solutions" {
            for step in &three_steps() {
                assert!(step.satisfied_by(&step.solution_event()), "step {}", step.id);
            }
        }
    }
}
