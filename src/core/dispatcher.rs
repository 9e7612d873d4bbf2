use crate::core::directory::Directory;
use crate::core::template::{Template, Values};
use crate::domain::model::{MatchMap, Participant, RoundLabel};
use crate::domain::ports::{Message, NotificationChannel};
use crate::utils::error::{Result, RouletteError};
use serde::{Deserialize, Serialize};

/// Placeholders filled for round messages. Announcements use the ones
/// without `Other`, plus the round keys when a round is given.
pub const ROUND_PLACEHOLDERS: [&str; 11] = [
    "VarEmail",
    "VarFriendlyName",
    "VarFullName",
    "VarGender",
    "VarRoundLabel",
    "VarRoundDate",
    "VarOtherEmail",
    "VarOtherFriendlyName",
    "VarOtherFullName",
    "VarOtherGender",
    "VarOtherCluster",
];

/// What to do when the channel refuses a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelFailurePolicy {
    /// Record the failure and keep sending.
    #[default]
    Continue,
    /// Stop at the first failure.
    Abort,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub rendered: usize,
    pub sent: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub dry_run: bool,
}

impl DispatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Dispatcher<'a> {
    channel: &'a dyn NotificationChannel,
    policy: ChannelFailurePolicy,
    dry_run: bool,
}

impl<'a> Dispatcher<'a> {
    pub fn new(channel: &'a dyn NotificationChannel, policy: ChannelFailurePolicy, dry_run: bool) -> Self {
        Self {
            channel,
            policy,
            dry_run,
        }
    }

    /// One message per matched participant, in directory order. All messages
    /// are rendered before the first one is sent.
    pub async fn send_round(
        &self,
        template: &Template,
        round: &RoundLabel,
        matches: &MatchMap,
        directory: &Directory,
    ) -> Result<DispatchReport> {
        preflight(template, ROUND_PLACEHOLDERS.iter().copied())?;

        let mut messages = Vec::new();
        for participant in directory.participants() {
            let Some(partner_email) = matches.get(&participant.email) else {
                tracing::debug!("{} is unmatched in round {}", participant.email, round);
                continue;
            };
            let partner = directory.get(partner_email).ok_or_else(|| {
                RouletteError::validation(
                    None,
                    "match",
                    format!(
                        "{}'s partner {} in round {} is not in the directory",
                        participant.email, partner_email, round
                    ),
                )
            })?;
            let values = round_values(participant, partner, round);
            messages.push(render(template, participant, &values)?);
        }

        self.deliver(messages).await
    }

    /// One message per participant in the directory, regardless of pairing.
    pub async fn announce(
        &self,
        template: &Template,
        directory: &Directory,
        round: Option<&RoundLabel>,
    ) -> Result<DispatchReport> {
        preflight(
            template,
            ROUND_PLACEHOLDERS
                .iter()
                .copied()
                .filter(|name| !name.starts_with("VarOther"))
                .filter(|name| round.is_some() || !name.starts_with("VarRound")),
        )?;

        let mut messages = Vec::with_capacity(directory.len());
        for participant in directory.participants() {
            let mut values = own_values(participant);
            if let Some(round) = round {
                values.extend(round_keys(round));
            }
            messages.push(render(template, participant, &values)?);
        }

        self.deliver(messages).await
    }

    async fn deliver(&self, messages: Vec<Message>) -> Result<DispatchReport> {
        let mut report = DispatchReport {
            rendered: messages.len(),
            dry_run: self.dry_run,
            ..Default::default()
        };

        if self.dry_run {
            for message in &messages {
                tracing::info!("[preview] {} <- '{}'", message.to, message.subject);
                tracing::debug!("[preview] body:\n{}", message.body);
            }
            return Ok(report);
        }

        // Strictly one at a time: failures stay attributable to one message.
        for message in &messages {
            tracing::info!("Sending to {} via {}", message.to, self.channel.name());
            match self.channel.send(message).await {
                Ok(()) => report.sent.push(message.to.clone()),
                Err(e) => {
                    tracing::error!("Failed to send to {}: {}", message.to, e);
                    report.failed.push((message.to.clone(), e.to_string()));
                    if self.policy == ChannelFailurePolicy::Abort {
                        return Err(aborted(e, &report.sent));
                    }
                }
            }
        }

        if !report.failed.is_empty() {
            let failed: Vec<&str> = report.failed.iter().map(|(to, _)| to.as_str()).collect();
            tracing::error!(
                "Failed to send to the following participants:\n  {}",
                failed.join("\n  ")
            );
        }
        Ok(report)
    }
}

/// The error returned under `Abort`; it carries everyone already notified.
fn aborted(error: RouletteError, sent: &[String]) -> RouletteError {
    if sent.is_empty() {
        tracing::error!("Aborted before anyone was notified");
        return error;
    }
    tracing::error!(
        "Aborted after notifying {} participants:\n  {}",
        sent.len(),
        sent.join("\n  ")
    );
    match error {
        RouletteError::ChannelError { recipient, message } => RouletteError::ChannelError {
            recipient,
            message: format!("{}; already notified: {}", message, sent.join(", ")),
        },
        other => other,
    }
}

/// Renders the template once with every placeholder the message kind offers.
fn preflight<'n>(template: &Template, names: impl Iterator<Item = &'n str>) -> Result<()> {
    let sample: Values = names
        .map(|name| {
            let value = if name.ends_with("Gender") { "nonbinary" } else { "x" };
            (name.to_string(), value.to_string())
        })
        .collect();
    template.render(&sample).map(|_| ())
}

fn render(template: &Template, participant: &Participant, values: &Values) -> Result<Message> {
    let rendered = template.render(values)?;
    Ok(Message {
        to: participant.email.clone(),
        subject: rendered.subject,
        body: rendered.body,
    })
}

fn own_values(participant: &Participant) -> Values {
    Values::from([
        ("VarEmail".to_string(), participant.email.clone()),
        ("VarFriendlyName".to_string(), participant.friendly_name.clone()),
        ("VarFullName".to_string(), participant.full_name.clone()),
        ("VarGender".to_string(), participant.gender.to_string()),
    ])
}

fn round_keys(round: &RoundLabel) -> Values {
    Values::from([
        ("VarRoundLabel".to_string(), round.to_string()),
        ("VarRoundDate".to_string(), round.display_date()),
    ])
}

fn round_values(participant: &Participant, partner: &Participant, round: &RoundLabel) -> Values {
    let mut values = own_values(participant);
    values.extend(round_keys(round));
    values.extend([
        ("VarOtherEmail".to_string(), partner.email.clone()),
        ("VarOtherFriendlyName".to_string(), partner.friendly_name.clone()),
        ("VarOtherFullName".to_string(), partner.full_name.clone()),
        ("VarOtherGender".to_string(), partner.gender.to_string()),
        ("VarOtherCluster".to_string(), partner.cluster.clone()),
    ]);
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::channel::DryRunChannel;
    use crate::core::template::{check_placeholder_names, with_pronouns};
    use crate::domain::model::Gender;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Refuses messages for one address and records the rest.
    struct FlakyChannel {
        refuse: String,
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationChannel for FlakyChannel {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn send(&self, message: &Message) -> Result<()> {
            if message.to == self.refuse {
                return Err(RouletteError::ChannelError {
                    recipient: message.to.clone(),
                    message: "session expired".to_string(),
                });
            }
            self.delivered.lock().unwrap().push(message.to.clone());
            Ok(())
        }
    }

    fn directory() -> Directory {
        let mut bob = Participant::new("bob@x", "Bob", "Bob Ray", Gender::Male);
        bob.cluster = "Eng".to_string();
        Directory::new(vec![
            Participant::new("ann@x", "Ann", "Ann Lee", Gender::Female),
            bob,
            Participant::new("cy@x", "Cy", "Cy Doe", Gender::Nonbinary),
        ])
        .unwrap()
    }

    fn matches() -> MatchMap {
        MatchMap::from([
            ("ann@x".to_string(), "bob@x".to_string()),
            ("bob@x".to_string(), "ann@x".to_string()),
        ])
    }

    fn template() -> Template {
        Template::new(
            "Lunch on VarRoundDate",
            "Hi VarFriendlyName, you are meeting VarOtherFullName (VarOtherEmail). Say hi to VarOtherObjectPronoun!",
        )
    }

    fn round() -> RoundLabel {
        RoundLabel::new("2022-10-08").unwrap()
    }

    #[test]
    fn test_round_placeholder_names_do_not_overlap() {
        let mut names: Vec<String> = ROUND_PLACEHOLDERS.iter().map(|s| s.to_string()).collect();
        let sample = round_values(
            &directory().participants()[0],
            &directory().participants()[1],
            &round(),
        );
        names.extend(with_pronouns(&sample).unwrap().into_keys());
        names.sort();
        names.dedup();
        check_placeholder_names(names.iter().map(|s| s.as_str())).unwrap();
    }

    #[tokio::test]
    async fn test_sends_one_message_per_matched_participant() {
        let channel = DryRunChannel::new();
        let dispatcher = Dispatcher::new(&channel, ChannelFailurePolicy::Continue, false);
        let report = dispatcher
            .send_round(&template(), &round(), &matches(), &directory())
            .await
            .unwrap();

        assert_eq!(report.sent, ["ann@x", "bob@x"]);
        let sent = channel.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, "Lunch on Saturday October 08, 2022");
        assert_eq!(
            sent[0].body,
            "Hi Ann, you are meeting Bob Ray (bob@x). Say hi to him!"
        );
        assert_eq!(
            sent[1].body,
            "Hi Bob, you are meeting Ann Lee (ann@x). Say hi to her!"
        );
    }

    #[tokio::test]
    async fn test_dry_run_renders_without_sending() {
        let channel = DryRunChannel::new();
        let dispatcher = Dispatcher::new(&channel, ChannelFailurePolicy::Continue, true);
        let report = dispatcher
            .send_round(&template(), &round(), &matches(), &directory())
            .await
            .unwrap();
        assert_eq!(report.rendered, 2);
        assert!(report.sent.is_empty());
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn test_template_defect_aborts_before_any_send() {
        let channel = DryRunChannel::new();
        let dispatcher = Dispatcher::new(&channel, ChannelFailurePolicy::Continue, false);
        let broken = Template::new("Lunch", "Meet VarOtherNickname");
        let err = dispatcher
            .send_round(&broken, &round(), &matches(), &directory())
            .await
            .unwrap_err();
        assert!(matches!(err, RouletteError::TemplateError { .. }));
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn test_channel_failure_continues_by_default() {
        let channel = FlakyChannel {
            refuse: "ann@x".to_string(),
            delivered: Mutex::new(Vec::new()),
        };
        let dispatcher = Dispatcher::new(&channel, ChannelFailurePolicy::Continue, false);
        let report = dispatcher
            .send_round(&template(), &round(), &matches(), &directory())
            .await
            .unwrap();
        assert!(!report.is_success());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "ann@x");
        assert_eq!(*channel.delivered.lock().unwrap(), ["bob@x"]);
    }

    #[tokio::test]
    async fn test_channel_failure_can_abort_the_pass() {
        let channel = FlakyChannel {
            refuse: "ann@x".to_string(),
            delivered: Mutex::new(Vec::new()),
        };
        let dispatcher = Dispatcher::new(&channel, ChannelFailurePolicy::Abort, false);
        let err = dispatcher
            .send_round(&template(), &round(), &matches(), &directory())
            .await
            .unwrap_err();
        assert!(matches!(err, RouletteError::ChannelError { .. }));
        assert!(channel.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_abort_error_names_participants_already_notified() {
        let channel = FlakyChannel {
            refuse: "bob@x".to_string(),
            delivered: Mutex::new(Vec::new()),
        };
        let dispatcher = Dispatcher::new(&channel, ChannelFailurePolicy::Abort, false);
        let err = dispatcher
            .send_round(&template(), &round(), &matches(), &directory())
            .await
            .unwrap_err();
        match err {
            RouletteError::ChannelError { recipient, message } => {
                assert_eq!(recipient, "bob@x");
                assert!(message.starts_with("session expired"));
                assert!(message.ends_with("already notified: ann@x"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*channel.delivered.lock().unwrap(), ["ann@x"]);
    }

    #[tokio::test]
    async fn test_unknown_placeholder_fails_even_without_matches() {
        let channel = DryRunChannel::new();
        let dispatcher = Dispatcher::new(&channel, ChannelFailurePolicy::Continue, false);
        let broken = Template::new("Lunch", "Meet VarOtherNickname");
        let err = dispatcher
            .send_round(&broken, &round(), &MatchMap::new(), &directory())
            .await
            .unwrap_err();
        match err {
            RouletteError::TemplateError { unresolved } => assert_eq!(unresolved, ["VarOtherNickname"]),
            other => panic!("unexpected error: {other:?}"),
        }

        // Partner keys mean nothing in an announcement.
        let partner_notice = Template::new("Hi", "Your partner is VarOtherFriendlyName");
        assert!(matches!(
            dispatcher.announce(&partner_notice, &directory(), Some(&round())).await,
            Err(RouletteError::TemplateError { .. })
        ));
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_partner_is_validation_error() {
        let channel = DryRunChannel::new();
        let dispatcher = Dispatcher::new(&channel, ChannelFailurePolicy::Continue, false);
        let stale = MatchMap::from([
            ("ann@x".to_string(), "gone@x".to_string()),
            ("gone@x".to_string(), "ann@x".to_string()),
        ]);
        let err = dispatcher
            .send_round(&template(), &round(), &stale, &directory())
            .await
            .unwrap_err();
        assert!(matches!(err, RouletteError::ValidationError { .. }));
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn test_announcement_reaches_everyone() {
        let channel = DryRunChannel::new();
        let dispatcher = Dispatcher::new(&channel, ChannelFailurePolicy::Continue, false);
        let notice = Template::new(
            "Lunch roulette is back",
            "Hi VarFullName, we will pair you up soon. Tell us if VarSubjectPronoun would rather skip.",
        );
        let report = dispatcher.announce(&notice, &directory(), None).await.unwrap();
        assert_eq!(report.sent, ["ann@x", "bob@x", "cy@x"]);
        assert_eq!(
            channel.sent()[2].body,
            "Hi Cy Doe, we will pair you up soon. Tell us if they would rather skip."
        );

        let needs_round = Template::new("Next round: VarRoundDate", "Hi VarFriendlyName");
        assert!(dispatcher.announce(&needs_round, &directory(), None).await.is_err());
        let report = dispatcher
            .announce(&needs_round, &directory(), Some(&round()))
            .await
            .unwrap();
        assert_eq!(report.rendered, 3);
    }
}
