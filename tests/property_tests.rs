#![allow(missing_docs)]

use std::sync::Arc;

use proptest::prelude::*;
use queryscope::query::{build_script, classify, Archetype, Pacing, Simulator};
use queryscope::relation::{row, InMemoryRelations, Relation, Row, Value};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

fn users_with_ages(ages: &[i64]) -> InMemoryRelations {
    let rows: Vec<Row> = ages
        .iter()
        .enumerate()
        .map(|(i, age)| row([("id", Value::Int(i as i64 + 1)), ("age", Value::Int(*age))]))
        .collect();
    let users = Relation::new("users", vec!["id".into(), "age".into()], rows)
        .unwrap()
        .with_key("id")
        .unwrap();
    InMemoryRelations::new().with_relation(users)
}

fn join_store(users: usize, owners: &[usize]) -> InMemoryRelations {
    let user_rows = (1..=users as i64).map(|id| row([("id", Value::Int(id))])).collect();
    let order_rows = owners
        .iter()
        .enumerate()
        .map(|(i, owner)| {
            row([
                ("id", Value::Int(1_000 + i as i64)),
                ("user_id", Value::Int(*owner as i64)),
            ])
        })
        .collect();
    InMemoryRelations::new()
        .with_relation(Relation::new("users", vec!["id".into()], user_rows).unwrap())
        .with_relation(
            Relation::new("orders", vec!["id".into(), "user_id".into()], order_rows).unwrap(),
        )
}

proptest! {
    #[test]
    fn prop_classifier_is_total(query in ".{0,64}") {
        let archetype = classify(&query);
        prop_assert!(Archetype::ALL.contains(&archetype));
        prop_assert!(!build_script(archetype).is_empty());
    }

    #[test]
    fn prop_join_keyword_wins(prefix in "[a-z ]{0,16}", suffix in "[a-z ]{0,16}", upper in any::<bool>()) {
        let keyword = if upper { "JOIN" } else { "join" };
        let query = format!("{prefix} id = 1 {keyword} age > 25 {suffix}");
        prop_assert_eq!(classify(&query), Archetype::EqualityJoin);
    }

    #[test]
    fn prop_seek_beats_scan(prefix in "[a-ik-z ]{0,16}") {
        let query = format!("{prefix} age > 25 and id = 1");
        prop_assert_eq!(classify(&query), Archetype::IndexSeek);
    }

    #[test]
    fn prop_filter_scan_matches_reference(ages in prop::collection::vec(0i64..80, 0..24)) {
        let expected: Vec<Value> = ages
            .iter()
            .filter(|age| **age > 25)
            .map(|age| Value::Int(*age))
            .collect();
        let sim = Simulator::new(Arc::new(users_with_ages(&ages)), Pacing::instant());
        let report = runtime().block_on(sim.run("age > 25")).unwrap();
        let got: Vec<Value> = report.rows.iter().map(|r| r["age"].clone()).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_join_matches_reference(users in 1usize..6, owners in prop::collection::vec(1usize..8, 0..10)) {
        let mut expected = Vec::new();
        for user in 1..=users {
            for (i, owner) in owners.iter().enumerate() {
                if *owner == user {
                    expected.push((user as i64, 1_000 + i as i64));
                }
            }
        }
        let sim = Simulator::new(Arc::new(join_store(users, &owners)), Pacing::instant());
        let report = runtime().block_on(sim.run("users join orders")).unwrap();
        let got: Vec<(i64, i64)> = report
            .rows
            .iter()
            .map(|r| match (&r["user_id"], &r["id"]) {
                (Value::Int(user), Value::Int(order)) => (*user, *order),
                other => panic!("unexpected row shape {other:?}"),
            })
            .collect();
        prop_assert_eq!(got, expected);
    }
}
