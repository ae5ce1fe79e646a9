use crate::infra::{InMemoryImageStorage, InMemoryMarketplace};
use clap::Args;
use rentazuela::config::MarketplaceConfig;
use rentazuela::error::AppError;
use rentazuela::workflows::messaging::MessagingService;
use rentazuela::workflows::publishing::{
    DraftUpdate, ImageUpload, ListingCategory, ListingDetails, ListingPublisher, ListingType,
    PropertyDetails, PropertyType, PublishWorkflow, SubscriptionTier,
};
use rentazuela::workflows::shared::{CallerIdentity, Currency};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SELLER_ID: &str = "seller-9";
const BUYER_ID: &str = "buyer-7";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Image files to attach to the sample listing. Defaults to two built-in samples.
    #[arg(long = "image")]
    pub(crate) images: Vec<PathBuf>,
    /// Skip the buyer/seller conversation portion of the demo.
    #[arg(long)]
    pub(crate) skip_messaging: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        images,
        skip_messaging,
    } = args;

    let limits = MarketplaceConfig::default();
    let store = Arc::new(InMemoryMarketplace::default());
    store.upsert_profile(
        SELLER_ID,
        "Carlos Méndez",
        Some("https://cdn.test/avatars/carlos.png"),
    )?;
    store.upsert_profile(BUYER_ID, "Ana Rodríguez", None)?;
    store.set_tier(SELLER_ID, SubscriptionTier::Pro)?;
    let storage = Arc::new(InMemoryImageStorage::new("memory://listing-images"));
    let publisher = ListingPublisher::new(store.clone(), storage.clone(), limits.image_policy());

    println!("Rentazuela marketplace demo");
    println!("\nPublishing a listing as {SELLER_ID}");

    let mut workflow = PublishWorkflow::new(limits.image_policy());
    workflow.update_data(DraftUpdate {
        category: Some(ListingCategory::PropertyLongTerm),
        ..DraftUpdate::default()
    });
    if !workflow.next_step() {
        println!("- Step {} blocked:", workflow.current_step().title());
        for (field, message) in workflow.errors().iter() {
            println!("    {field}: {message}");
        }
    }

    workflow.update_data(DraftUpdate {
        listing_type: Some(ListingType::Rent),
        ..DraftUpdate::default()
    });
    advance(&mut workflow);

    workflow.update_data(DraftUpdate {
        title: Some("Apartamento en Altamira con vista al Ávila".to_string()),
        description: Some(
            "Tres habitaciones, dos baños, puesto de estacionamiento y vigilancia 24 horas"
                .to_string(),
        ),
        price: Some(850.0),
        currency: Some(Currency::Usd),
        ..DraftUpdate::default()
    });
    advance(&mut workflow);

    workflow.update_data(DraftUpdate {
        city: Some("Caracas".to_string()),
        state: Some("Miranda".to_string()),
        address: Some("Av. San Juan Bosco, Torre Altamira".to_string()),
        ..DraftUpdate::default()
    });
    advance(&mut workflow);

    workflow.set_details(Some(ListingDetails::Property(PropertyDetails {
        bedrooms: Some(3),
        bathrooms: Some(2),
        square_meters: Some(140),
        parking_spaces: Some(1),
        ..PropertyDetails::new(PropertyType::Apartment)
    })));
    advance(&mut workflow);

    for upload in demo_images(&images)? {
        let file_name = upload.file_name.clone();
        match workflow.add_image(upload) {
            Ok(()) => println!("  + {file_name}"),
            Err(reason) => println!("  - {file_name} rejected: {reason}"),
        }
    }
    advance(&mut workflow);

    let seller = CallerIdentity::user(SELLER_ID);
    let receipt = workflow.submit(&seller, &publisher)?;
    println!(
        "- Published listing {} with {} image(s)",
        receipt.listing_id,
        receipt.images.len()
    );
    for image in &receipt.images {
        println!("    [{}] {}", image.position, image.url);
    }
    for (path, object) in storage.objects() {
        println!(
            "    stored {path} ({}, {} bytes)",
            object.content_type, object.size
        );
    }

    if let Some(listing) = store.listing(&receipt.listing_id)? {
        let mut edit =
            PublishWorkflow::from_listing(limits.image_policy(), &listing, &receipt.images);
        edit.update_data(DraftUpdate {
            price: Some(820.0),
            ..DraftUpdate::default()
        });
        let saved = edit.submit(&seller, &publisher)?;
        println!(
            "- Edited listing {}: new price 820 USD, {} image(s) kept",
            saved.listing_id,
            saved.images.len()
        );
    }

    if skip_messaging {
        return Ok(());
    }

    println!("\nConversation between {BUYER_ID} and {SELLER_ID}");
    let messaging = MessagingService::new(store.clone(), store, limits.messaging_policy());
    let buyer = CallerIdentity::user(BUYER_ID);

    let conversation_id = messaging.create_conversation(&buyer, &receipt.listing_id)?;
    messaging.send_message(
        &buyer,
        &conversation_id,
        "Hola, ¿el apartamento sigue disponible?",
    )?;
    messaging.send_message(
        &seller,
        &conversation_id,
        "Sí, puedes visitarlo el sábado",
    )?;
    messaging.send_message(&buyer, &conversation_id, "Perfecto, ahí estaré")?;

    println!(
        "- Unread: seller {} | buyer {}",
        messaging.unread_messages_count(&seller),
        messaging.unread_messages_count(&buyer)
    );

    for summary in messaging.conversations(&seller) {
        println!(
            "- Inbox row {} | {} | with {} | last: {} | unread {}",
            summary.id,
            summary.listing_title.as_deref().unwrap_or("Anuncio"),
            summary.other_user_name.as_deref().unwrap_or("Usuario"),
            summary.last_message.as_deref().unwrap_or("-"),
            summary.unread_count
        );
    }

    let updated = messaging.mark_messages_as_read(&seller, &conversation_id)?;
    println!("- Seller read {updated} message(s)");

    if let Some(thread) = messaging.conversation(&buyer, &conversation_id) {
        match serde_json::to_string_pretty(&thread) {
            Ok(json) => println!("  Thread payload:\n{}", json),
            Err(err) => println!("  Thread payload unavailable: {}", err),
        }
    }

    Ok(())
}

fn advance(workflow: &mut PublishWorkflow) {
    let step = workflow.current_step();
    if workflow.next_step() {
        println!("- {} ok", step.title());
    } else {
        println!("- {} blocked:", step.title());
        for (field, message) in workflow.errors().iter() {
            println!("    {field}: {message}");
        }
    }
}

fn demo_images(paths: &[PathBuf]) -> Result<Vec<ImageUpload>, AppError> {
    if paths.is_empty() {
        return Ok(vec![
            sample_image("sala.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]),
            sample_image("cocina.png", vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A]),
        ]);
    }

    paths
        .iter()
        .map(|path| -> Result<ImageUpload, AppError> {
            let bytes = std::fs::read(path)?;
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("imagen")
                .to_string();
            Ok(ImageUpload::new(file_name, content_type_for(path), bytes))
        })
        .collect()
}

fn sample_image(file_name: &str, bytes: Vec<u8>) -> ImageUpload {
    ImageUpload::new(file_name, content_type_for(Path::new(file_name)), bytes)
}

fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
