//! Built-in playground tables.

use crate::relation::store::{row, InMemoryRelations, Relation};
use crate::relation::value::Value;
use crate::types::Result;

/// Name of the built-in customer table.
pub const USERS: &str = "users";
/// Name of the built-in order table.
pub const ORDERS: &str = "orders";

/// `users(id, name, age, email)`, keyed on `id`.
pub fn users() -> Result<Relation> {
    let people = [
        (1, "Alice", 24, "alice@cosmos.io"),
        (2, "Bob", 29, "bob@cosmos.io"),
        (3, "Charlie", 31, "charlie@cosmos.io"),
        (4, "David", 22, "david@cosmos.io"),
        (5, "Eve", 27, "eve@cosmos.io"),
    ];
    let rows = people
        .into_iter()
        .map(|(id, name, age, email)| {
            row([
                ("id", Value::Int(id)),
                ("name", Value::from(name)),
                ("age", Value::Int(age)),
                ("email", Value::from(email)),
            ])
        })
        .collect();
    Relation::new(USERS, columns(&["id", "name", "age", "email"]), rows)?.with_key("id")
}

/// `orders(id, user_id, amount)`, keyed on `id`.
pub fn orders() -> Result<Relation> {
    let placed = [(101, 1, 250), (102, 1, 450), (103, 2, 150), (104, 5, 300)];
    let rows = placed
        .into_iter()
        .map(|(id, user_id, amount)| {
            row([
                ("id", Value::Int(id)),
                ("user_id", Value::Int(user_id)),
                ("amount", Value::Int(amount)),
            ])
        })
        .collect();
    Relation::new(ORDERS, columns(&["id", "user_id", "amount"]), rows)?.with_key("id")
}

/// Store holding both built-in tables.
pub fn playground_relations() -> Result<InMemoryRelations> {
    Ok(InMemoryRelations::new()
        .with_relation(users()?)
        .with_relation(orders()?))
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_owned()).collect()
}
