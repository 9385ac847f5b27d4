//! CLI tests

use clap::Parser;

use crate::{Cli, Commands, ConfigAction, HintAction, OutputFormat};
use prereq_graph_core::domain::hints::HintStatus;
use prereq_graph_core::domain::prerequisites::{PrerequisiteSort, PrerequisiteStatus};

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["prereq-graph", "topic", "10", "--format", "json", "--db", "/tmp/g.db"]).unwrap();
    assert_eq!(cli.format, OutputFormat::Json);
    assert_eq!(cli.db.as_deref(), Some(std::path::Path::new("/tmp/g.db")));
    assert!(matches!(cli.command, Commands::Topic { topic_id: 10 }));
}

#[test]
fn test_list_parses_status_and_sort() {
    let cli = Cli::try_parse_from([
        "prereq-graph", "list", "--status", "needs_review", "--sort", "topic-count", "--page-size", "50",
    ])
    .unwrap();
    match cli.command {
        Commands::List { status, sort, page, page_size, .. } => {
            assert_eq!(status, Some(PrerequisiteStatus::NeedsReview));
            assert_eq!(sort, PrerequisiteSort::TopicCount);
            assert_eq!(page, 1);
            assert_eq!(page_size, 50);
        }
        _ => panic!("expected list"),
    }
}

#[test]
fn test_list_rejects_unknown_status() {
    assert!(Cli::try_parse_from(["prereq-graph", "list", "--status", "archived"]).is_err());
}

#[test]
fn test_merge_requires_two_ids_and_a_target() {
    assert!(Cli::try_parse_from(["prereq-graph", "merge", "1", "--target-id", "1"]).is_err());
    assert!(Cli::try_parse_from(["prereq-graph", "merge", "1", "2"]).is_err());
    assert!(
        Cli::try_parse_from(["prereq-graph", "merge", "1", "2", "--target-id", "1", "--target-name", "x"]).is_err()
    );

    let cli = Cli::try_parse_from(["prereq-graph", "merge", "1", "2", "3", "--target-name", "Orbita"]).unwrap();
    match cli.command {
        Commands::Merge { ids, target_id, target_name } => {
            assert_eq!(ids, vec![1, 2, 3]);
            assert_eq!(target_id, None);
            assert_eq!(target_name.as_deref(), Some("Orbita"));
        }
        _ => panic!("expected merge"),
    }
}

#[test]
fn test_upgrade_splits_concept_list() {
    let cli = Cli::try_parse_from(["prereq-graph", "upgrade", "7", "--concepts", "3,1", "--label", "Orbita"]).unwrap();
    match cli.command {
        Commands::Upgrade { id, concepts, label } => {
            assert_eq!(id, 7);
            assert_eq!(concepts, vec![3, 1]);
            assert_eq!(label.as_deref(), Some("Orbita"));
        }
        _ => panic!("expected upgrade"),
    }
}

#[test]
fn test_hints_and_config_subcommands() {
    let cli = Cli::try_parse_from(["prereq-graph", "hints", "list", "--status", "ignored", "--limit", "5"]).unwrap();
    match cli.command {
        Commands::Hints {
            action: HintAction::List { status, topic, limit },
        } => {
            assert_eq!(status, Some(HintStatus::Ignored));
            assert_eq!(topic, None);
            assert_eq!(limit, Some(5));
        }
        _ => panic!("expected hints list"),
    }

    let cli = Cli::try_parse_from(["prereq-graph", "config", "set", "strength.strong_threshold", "12"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Config { action: ConfigAction::Set { .. } }
    ));
}
