use clap::{Args, Subcommand};
use coursenotes_core::{patch_from, EntityId, PageKey, ResourceAddress};
use serde_json::Value;

use super::{confirm, expect_topic, CommandError};
use crate::client::Client;

#[derive(Args)]
pub struct TopicCommand {
    #[command(subcommand)]
    pub command: TopicSubcommand,
}

#[derive(Subcommand)]
pub enum TopicSubcommand {
    /// Add a topic to a course
    Create {
        /// Course ID
        course: EntityId,

        /// Name of the topic
        name: String,
    },

    /// Rename a topic
    Rename {
        /// Topic address (COURSE/TOPIC)
        topic: ResourceAddress,

        /// New name
        name: String,
    },

    /// Delete a topic and its notes
    Delete {
        /// Topic address (COURSE/TOPIC)
        topic: ResourceAddress,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl TopicCommand {
    pub async fn run(&self, client: &Client) -> Result<(), CommandError> {
        client.user()?;
        client.open(PageKey::Courses).await?;
        let controller = &client.controller;

        match &self.command {
            TopicSubcommand::Create { course, name } => {
                let payload = patch_from([("name", Value::from(name.trim()))]);
                let topic = controller
                    .create(&PageKey::Courses, payload, &ResourceAddress::Course(*course))
                    .await?;
                println!("Created topic {}/{}", course, topic["id"]);
                Ok(())
            }

            TopicSubcommand::Rename { topic, name } => {
                let address = expect_topic(*topic)?;
                let patch = patch_from([("name", Value::from(name.trim()))]);
                controller.update(&address, patch).await?;
                Ok(())
            }

            TopicSubcommand::Delete { topic, force } => {
                let address = expect_topic(*topic)?;
                let name = match (address, controller.snapshot().courses()) {
                    (ResourceAddress::Topic(course_id, topic_id), Some(courses)) => courses
                        .iter()
                        .find(|c| c.id == course_id)
                        .and_then(|c| c.topic(topic_id))
                        .map(|t| t.name.clone()),
                    _ => None,
                };

                if let (Some(name), false) = (&name, *force) {
                    if !confirm(&format!("Delete topic '{}' and its notes?", name))? {
                        println!("Deletion cancelled.");
                        return Ok(());
                    }
                }

                controller.remove(&address).await?;
                Ok(())
            }
        }
    }
}
