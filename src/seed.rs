//! Demo data: one account with the stock categories and a few sample todos.

use secrecy::SecretString;
use tracing::info;

use crate::accounts::Account;
use crate::error::TodoError;
use crate::service::{TagInput, TodoInput, TodoService};

pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_PASSWORD: &str = "demo";

/// Categories every demo account starts with.
pub const DEFAULT_CATEGORIES: [&str; 4] = ["Private", "Public", "Purchase", "Do"];

/// (name, description, tags)
const SAMPLE_TODOS: [(&str, &str, &[&str]); 3] = [
    ("Köp mjölk", "3 liter mellanmjölk, eko", &["Purchase"]),
    ("Köp julgran", "En rödgran", &["Purchase", "Private"]),
    (
        "Pynta gran",
        "Glöm inte lamporna i granen och tomten",
        &["Do", "Private"],
    ),
];

/// Create the demo account and populate it. Returns `None` without touching
/// anything when the account already exists, so startup can call this every
/// time.
pub async fn seed_demo(service: &TodoService) -> Result<Option<Account>, TodoError> {
    let account = match service
        .signup(DEMO_USERNAME, &SecretString::from(DEMO_PASSWORD))
        .await
    {
        Ok(account) => account,
        Err(TodoError::UsernameTaken) => {
            info!(username = DEMO_USERNAME, "Demo account exists, skipping seed");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    for name in DEFAULT_CATEGORIES {
        service.create_tag(account.id, name, None).await?;
    }

    for (name, description, tags) in SAMPLE_TODOS {
        service
            .create_todo(
                account.id,
                TodoInput {
                    name: name.to_string(),
                    description: Some(description.to_string()),
                    tags: Some(TagInput {
                        names: tags.iter().map(|t| t.to_string()).collect(),
                        ids: Vec::new(),
                    }),
                },
            )
            .await?;
    }

    info!(
        account_id = account.id,
        categories = DEFAULT_CATEGORIES.len(),
        todos = SAMPLE_TODOS.len(),
        "Demo data seeded"
    );
    Ok(Some(account))
}
