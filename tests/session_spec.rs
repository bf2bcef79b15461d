use cyberlab::client::ProgressClient;
use cyberlab::console::Submission;
use cyberlab::labs::Lab;
use cyberlab::missions::Transition;
use cyberlab::progress::{LocalCache, ProgressStore, ReloadSource};
use cyberlab::session::{LabSession, SessionError};
use speculate2::speculate;

fn offline_store() -> ProgressStore {
    ProgressStore::new(
        LocalCache::open_memory().expect("Failed to open cache"),
        ProgressClient::new("http://127.0.0.1:9"),
    )
}

speculate! {
    before {
        let store = offline_store();
    }

    describe "opening" {
        it "lets anyone into lab 1" {
            assert!(LabSession::open(1, store.clone()).is_ok());
        }

        it "refuses a locked lab" {
            let err = LabSession::open(2, store.clone()).err().expect("lab 2 is locked");
            assert!(matches!(err, SessionError::LabLocked(2)));
        }

        it "refuses an unknown lab" {
            let err = LabSession::open(12, store.clone()).err().expect("no lab 12");
            assert!(matches!(err, SessionError::Lab(_)));
        }

        it "resumes saved progress" {
            store.record_step(1, 1).expect("valid step");
            store.record_step(1, 2).expect("valid step");

            let session = LabSession::open(1, store.clone()).expect("lab 1 opens");
            assert_eq!(session.completed_count(), 2);
            assert_eq!(session.current_step_id(), Some(3));
        }

        it "resumes from the local cache when nobody is signed in" {
            store.record_step(1, 1).expect("valid step");
            assert_eq!(tokio_test::block_on(store.reload()), ReloadSource::Local);

            let session = LabSession::open(1, store.clone()).expect("lab 1 opens");
            assert_eq!(session.current_step_id(), Some(2));
        }
    }

    describe "a recon session" {
        before {
            let mut session = LabSession::open(1, store.clone()).expect("lab 1 opens");
        }

        it "completes step 1 on whoami and saves it" {
            let result = session.run_command("whoami");
            match &result.submission {
                Submission::Displayed(response) => assert_eq!(response.lines[0], "student"),
                other => panic!("unexpected submission {:?}", other),
            }
            assert_eq!(result.update.transition, Transition::StepCompleted { step: 1 });
            assert!(result.update.sync.is_none());
            assert_eq!(store.lab_progress(1).completed_steps, vec![1]);
        }

        it "does nothing for blank input" {
            let result = session.run_command("   ");
            assert_eq!(result.submission, Submission::Ignored);
            assert_eq!(result.update.transition, Transition::Unchanged);
            assert!(session.interpreter().entries().is_empty());
            assert_eq!(session.completed_count(), 0);
        }

        it "does not advance the mission on clear" {
            let result = session.run_command("clear");
            assert_eq!(result.submission, Submission::Cleared);
            assert_eq!(result.update.transition, Transition::Unchanged);
        }

        it "takes the profile answer case-insensitively" {
            let update = session.answer_profile("  LOLA ");
            assert_eq!(update.transition, Transition::StepCompleted { step: 5 });
            assert_eq!(session.answer_profile("lola").transition, Transition::Unchanged);
        }

        it "only hands out the flag after the dork reveals it" {
            assert!(session.capture_flag().is_none());

            let broad = session.search("admin login").expect("recon has search");
            assert!(!broad.flag_revealed);
            assert_eq!(broad.update.transition, Transition::StepCompleted { step: 6 });

            let precise = session.search("site:evilcorp.com inurl:admin").expect("recon has search");
            assert!(precise.flag_revealed);

            let (flag, update) = session.capture_flag().expect("flag revealed");
            assert!(flag.starts_with("FLAG{"));
            assert_eq!(update.transition, Transition::StepCompleted { step: 9 });
        }

        it "ignores blank searches" {
            assert!(session.search("  ").is_none());
        }

        it "finishes the lab once and scores it locally without identity" {
            let lab = Lab::load(1).expect("lab loads");
            let mut signals = 0;
            for step in lab.steps.iter() {
                if session.complete_step(step.id).transition.is_lab_completed() {
                    signals += 1;
                }
            }
            for step in lab.steps.iter() {
                assert_eq!(session.complete_step(step.id).transition, Transition::Unchanged);
            }

            assert_eq!(signals, 1);
            assert!(session.all_complete());
            assert_eq!(store.total_score(), 100);
            // No identity, so the next lab stays locked.
            assert!(!store.is_unlocked(2));
        }

        it "resets only this lab's progress" {
            session.run_command("whoami");
            session.run_command("whois evilcorp.com");
            assert_eq!(session.completed_count(), 2);

            session.reset_progress();

            assert_eq!(session.completed_count(), 0);
            assert!(store.lab_progress(1).completed_steps.is_empty());
            assert_eq!(session.interpreter().entries().len(), 2);
        }
    }
}
