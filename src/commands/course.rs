use clap::{Args, Subcommand};
use coursenotes_core::{patch_from, EntityId, PageKey, ResourceAddress};
use serde_json::Value;

use super::{confirm, CommandError, OutputFormat};
use crate::client::Client;

#[derive(Args)]
pub struct CourseCommand {
    #[command(subcommand)]
    pub command: CourseSubcommand,
}

#[derive(Subcommand)]
pub enum CourseSubcommand {
    /// List your courses with their topics and notes
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Create a new course
    Create {
        /// Name of the course
        name: String,
    },

    /// Rename a course
    Rename {
        /// Course ID
        course: EntityId,

        /// New name
        name: String,
    },

    /// Delete a course
    Delete {
        /// Course ID
        course: EntityId,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl CourseCommand {
    pub async fn run(&self, client: &Client) -> Result<(), CommandError> {
        client.user()?;
        client.open(PageKey::Courses).await?;
        let controller = &client.controller;

        match &self.command {
            CourseSubcommand::List { format } => {
                let snapshot = controller.snapshot();
                let courses = snapshot.courses().unwrap_or_default();
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(courses)?);
                    }
                    OutputFormat::Text => {
                        if courses.is_empty() {
                            println!("No courses found.");
                        }
                        for course in courses {
                            print!("{}", course);
                        }
                    }
                }
                Ok(())
            }

            CourseSubcommand::Create { name } => {
                let payload = patch_from([("name", Value::from(name.trim()))]);
                let course = controller
                    .create(&PageKey::Courses, payload, &ResourceAddress::Flat)
                    .await?;
                println!("Created course {}", course["id"]);
                Ok(())
            }

            CourseSubcommand::Rename { course, name } => {
                let patch = patch_from([("name", Value::from(name.trim()))]);
                controller
                    .update(&ResourceAddress::Course(*course), patch)
                    .await?;
                Ok(())
            }

            CourseSubcommand::Delete { course, force } => {
                let name = controller.snapshot().courses().and_then(|courses| {
                    courses
                        .iter()
                        .find(|c| c.id == *course)
                        .map(|c| c.name.clone())
                });

                if let (Some(name), false) = (&name, *force) {
                    if !confirm(&format!("Delete course '{}' and all its topics?", name))? {
                        println!("Deletion cancelled.");
                        return Ok(());
                    }
                }

                controller.remove(&ResourceAddress::Course(*course)).await?;
                Ok(())
            }
        }
    }
}
