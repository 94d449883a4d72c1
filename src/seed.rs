use rusqlite::Connection;

use crate::internal_error::InternalResult;
use crate::lists::helpers::{get_categories, get_task_types};
use crate::tasks::data::TaskDefaults;
use crate::tasks::helpers::add_task_to_db;
use crate::users::data::UserID;

pub const EXAMPLE_CATEGORIES_PER_TYPE: usize = 6;

/// Gives `user_id` one example task for each of the first few categories of
/// every task type. Returns how many tasks were inserted.
pub fn seed_example_tasks(user_id: UserID, db_connection: &mut Connection) -> InternalResult<usize> {
    let task_types = get_task_types(db_connection)?;
    let categories = get_categories(db_connection)?;

    if task_types.is_empty() || categories.is_empty() {
        tracing::warn!("Task types or categories not found, nothing to seed");
        return Ok(0);
    }

    let transaction = db_connection.transaction()?;
    let mut inserted = 0;

    for task_type in task_types.iter() {
        let type_categories = categories
            .iter()
            .filter(|category| category.task_type == task_type.id)
            .take(EXAMPLE_CATEGORIES_PER_TYPE);

        for category in type_categories {
            add_task_to_db(
                user_id,
                &format!("{} {} Example", task_type.name, category.name),
                task_type.id,
                category.id,
                TaskDefaults::default(),
                &transaction,
            )?;
            inserted += 1;
        }
    }

    transaction.commit()?;
    tracing::info!("{} tasks inserted for user {}", inserted, user_id);

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::init_database;
    use crate::lists::helpers::add_category_to_db;
    use crate::tasks::helpers::get_tasks_for_user;

    #[test]
    fn nothing_is_seeded_without_categories() {
        let mut connection = Connection::open_in_memory().unwrap();
        init_database(&connection).unwrap();

        assert_eq!(seed_example_tasks(1, &mut connection).unwrap(), 0);
    }

    #[test]
    fn at_most_six_categories_per_type() {
        let mut connection = Connection::open_in_memory().unwrap();
        init_database(&connection).unwrap();

        let task_types = get_task_types(&connection).unwrap();
        for n in 0..8 {
            add_category_to_db(&format!("Topic {}", n), None, task_types[0].id, &connection).unwrap();
        }
        add_category_to_db("Voyage", None, task_types[1].id, &connection).unwrap();

        assert_eq!(seed_example_tasks(9, &mut connection).unwrap(), 7);

        let tasks = get_tasks_for_user(9, &connection).unwrap();
        assert_eq!(tasks.len(), 7);
        assert_eq!(tasks[0].title, "Task1 Topic 0 Example");
        assert_eq!(tasks[6].title, "Task2 Voyage Example");
    }
}
