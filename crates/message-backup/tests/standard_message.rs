use sd_backup_proto::{
	AttachmentLocator, BackupInfo, ChatItem, ChatItemType, DeliveryStatus, DirectionalDetails,
	FilePointer, Frame, IncomingMessageDetails, LinkPreview, Locator, MessageAttachment,
	MemoryStream, OutgoingMessageDetails, Quote, QuotedAttachment, Reaction, SendStatus,
	StandardMessage, Text,
};
use sd_message_backup::{
	attachment::AttachmentOwner,
	store::{Database, InteractionKind, MemoryDatabase, OutgoingMessageStatus, StoreError},
	MessageBackupConfig, PassReport,
};

use std::sync::Arc;

use tracing_test::traced_test;

mod common;

use common::{
	aci, chat, contact, contact_thread, local_identifiers, manager, self_recipient,
	threads_with_interactions, BACKUP_TIME_MS,
};

const ALICE_ID: u64 = 2;

fn restore(db: &Arc<MemoryDatabase>, items: Vec<Frame>) -> PassReport {
	let mut frames = vec![self_recipient(1), contact(ALICE_ID, aci(0xA)), chat(1, ALICE_ID)];
	frames.extend(items);

	let mut stream = MemoryStream::new(BackupInfo::new(BACKUP_TIME_MS), frames);

	manager(Arc::clone(db), MessageBackupConfig::default())
		.import_backup(&mut stream, &local_identifiers())
		.unwrap()
}

fn message(
	author_id: u64,
	date_sent: u64,
	directional_details: DirectionalDetails,
	message: StandardMessage,
) -> Frame {
	ChatItem {
		chat_id: 1,
		author_id,
		date_sent,
		directional_details: Some(directional_details),
		item: Some(ChatItemType::StandardMessage(message)),
		..Default::default()
	}
	.into()
}

fn incoming() -> DirectionalDetails {
	DirectionalDetails::Incoming(IncomingMessageDetails {
		date_received: 1,
		..Default::default()
	})
}

fn text(body: &str) -> StandardMessage {
	StandardMessage {
		text: Some(Text {
			body: body.to_string(),
		}),
		..Default::default()
	}
}

fn pointer() -> FilePointer {
	FilePointer {
		content_type: Some("image/jpeg".to_string()),
		file_name: Some("summit.jpg".to_string()),
		width: Some(640),
		height: Some(480),
		locator: Some(Locator::Attachment(AttachmentLocator {
			cdn_key: "summit".to_string(),
			cdn_number: 3,
			key: vec![1; 64],
			digest: vec![2; 32],
			size: 2_048,
			..Default::default()
		})),
		..Default::default()
	}
}

#[test]
#[traced_test]
fn unknown_send_status_recipient_is_dropped_from_the_message() {
	let db = Arc::new(MemoryDatabase::new());

	let report = restore(
		&db,
		vec![message(
			1,
			1_000,
			DirectionalDetails::Outgoing(OutgoingMessageDetails {
				send_status: vec![
					SendStatus {
						recipient_id: ALICE_ID,
						timestamp: 1_100,
						status: DeliveryStatus::Read,
					},
					SendStatus {
						recipient_id: 9,
						timestamp: 1_100,
						status: DeliveryStatus::Delivered,
					},
				],
			}),
			text("on my way"),
		)],
	);

	assert_eq!(report.partial_successes, 1);
	assert_eq!(report.failure_count(), 0);
	assert_eq!(report.errors.len(), 1);
	assert_eq!(report.errors[0].id, "1:1000");
	assert_eq!(report.errors[0].kind, "IdentifierNotFound.RecipientId");

	let threads = db.read(|tx| threads_with_interactions(tx)).unwrap();
	let (_, interactions) = contact_thread(&threads, aci(0xA)).unwrap();
	assert_eq!(interactions.len(), 1);

	let InteractionKind::Outgoing(outgoing) = &interactions[0].kind else {
		panic!("expected an outgoing message");
	};
	assert_eq!(outgoing.content.body.as_deref(), Some("on my way"));
	assert_eq!(outgoing.recipient_states.len(), 1);
	assert_eq!(outgoing.recipient_states[0].status, OutgoingMessageStatus::Read);
}

#[test]
fn reaction_from_undefined_recipient_is_dropped() {
	let db = Arc::new(MemoryDatabase::new());

	let mut reacted = text("made it to the top");
	reacted.reactions = vec![
		Reaction {
			emoji: "🎉".to_string(),
			author_id: 1,
			sent_timestamp: 1_200,
			sort_order: 1,
		},
		Reaction {
			emoji: "👍".to_string(),
			author_id: 9,
			sent_timestamp: 1_300,
			sort_order: 2,
		},
	];

	let report = restore(&db, vec![message(ALICE_ID, 1_000, incoming(), reacted)]);

	assert_eq!(report.partial_successes, 1);
	assert_eq!(report.errors.len(), 1);
	assert_eq!(report.errors[0].kind, "IdentifierNotFound.RecipientId");

	let threads = db.read(|tx| threads_with_interactions(tx)).unwrap();
	let (_, interactions) = contact_thread(&threads, aci(0xA)).unwrap();

	let InteractionKind::Incoming(incoming) = &interactions[0].kind else {
		panic!("expected an incoming message");
	};
	assert_eq!(incoming.content.reactions.len(), 1);
	assert_eq!(incoming.content.reactions[0].emoji, "🎉");
}

#[test]
fn quote_shares_the_attachment_of_the_quoted_message() {
	let db = Arc::new(MemoryDatabase::new());

	let original = StandardMessage {
		attachments: vec![MessageAttachment {
			pointer: Some(pointer()),
			was_downloaded: true,
			..Default::default()
		}],
		..text("look at this view")
	};

	let reply = StandardMessage {
		quote: Some(Quote {
			target_sent_timestamp: Some(1_000),
			author_id: ALICE_ID,
			text: Some("look at this view".to_string()),
			attachments: vec![QuotedAttachment {
				content_type: Some("image/jpeg".to_string()),
				file_name: Some("summit.jpg".to_string()),
				thumbnail: None,
			}],
			..Default::default()
		}),
		..text("wow")
	};

	let report = restore(
		&db,
		vec![
			message(ALICE_ID, 1_000, incoming(), original),
			message(
				1,
				2_000,
				DirectionalDetails::Outgoing(OutgoingMessageDetails::default()),
				reply,
			),
		],
	);

	assert!(report.is_clean());

	let references = db
		.read(|tx| {
			let threads = threads_with_interactions(tx)?;
			let (_, interactions) = contact_thread(&threads, aci(0xA)).unwrap();
			let original_row_id = interactions[0].row_id.unwrap();
			let reply_row_id = interactions[1].row_id.unwrap();

			Ok::<_, StoreError>((
				tx.attachment_references(original_row_id)?,
				tx.attachment_references(reply_row_id)?,
			))
		})
		.unwrap();

	let (body, quoted) = references;
	assert_eq!(body.len(), 1);
	assert_eq!(quoted.len(), 1);
	assert!(matches!(quoted[0].owner, AttachmentOwner::QuotedReply { .. }));
	// No new blob, the reply points at the original.
	assert_eq!(quoted[0].attachment_row_id, body[0].attachment_row_id);
}

#[test]
fn link_preview_missing_from_the_body_is_dropped() {
	let db = Arc::new(MemoryDatabase::new());

	let previewed = StandardMessage {
		link_preview: vec![LinkPreview {
			url: "https://trails.example/summit".to_string(),
			title: Some("Summit trail".to_string()),
			..Default::default()
		}],
		..text("no link in here")
	};

	let report = restore(&db, vec![message(ALICE_ID, 1_000, incoming(), previewed)]);

	assert_eq!(report.partial_successes, 1);
	assert_eq!(report.errors[0].kind, "LinkPreview.NotInBody");

	let threads = db.read(|tx| threads_with_interactions(tx)).unwrap();
	let (_, interactions) = contact_thread(&threads, aci(0xA)).unwrap();

	let InteractionKind::Incoming(incoming) = &interactions[0].kind else {
		panic!("expected an incoming message");
	};
	assert_eq!(incoming.content.body.as_deref(), Some("no link in here"));
	assert!(incoming.content.link_preview.is_none());
}

#[test]
fn messages_without_a_valid_direction_fail() {
	let db = Arc::new(MemoryDatabase::new());

	let report = restore(
		&db,
		vec![
			message(ALICE_ID, 1_000, DirectionalDetails::Directionless, text("hm")),
			// Outgoing, but authored by alice.
			message(
				ALICE_ID,
				2_000,
				DirectionalDetails::Outgoing(OutgoingMessageDetails::default()),
				text("hm"),
			),
			message(ALICE_ID, 3_000, incoming(), text("hello")),
		],
	);

	assert_eq!(report.failures, 2);
	assert_eq!(
		report
			.errors
			.iter()
			.map(|error| (error.id.as_str(), error.kind.as_str()))
			.collect::<Vec<_>>(),
		vec![
			("1:1000", "InvalidProtoData.DirectionlessStandardMessage"),
			("1:2000", "InvalidProtoData.OutgoingMessageNotFromLocalUser"),
		]
	);

	let threads = db.read(|tx| threads_with_interactions(tx)).unwrap();
	let (_, interactions) = contact_thread(&threads, aci(0xA)).unwrap();
	assert_eq!(interactions.len(), 1);
	assert_eq!(interactions[0].timestamp, 3_000);
}
