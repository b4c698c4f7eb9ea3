//! Property persistence: tenant-scoped CRUD, images and public search.

use chrono::NaiveDate;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::{AppError, is_unique_violation},
    models::{
        booking::Pagination,
        period::Period,
        property::{
            CreateImageRequest, CreatePropertyRequest, Property, PropertyDetail, PropertyImage,
            PropertyStatus, PropertyType, PublicPropertyList, PublicPropertyQuery, PublicPropertySummary,
            UpdatePropertyRequest,
        },
    },
    services::{subdomain, tenant_service},
};

/// URL slug from a display name: ASCII lower-case words joined by `-`.
///
/// Common Latin accents are folded (`Château` → `chateau`); other
/// characters separate words.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        let folded = match c {
            'à' | 'á' | 'â' | 'ä' | 'ã' | 'å' => 'a',
            'ç' => 'c',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ñ' => 'n',
            'ò' | 'ó' | 'ô' | 'ö' | 'õ' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'ý' | 'ÿ' => 'y',
            'œ' => {
                slug.push('o');
                'e'
            }
            c if c.is_ascii_alphanumeric() => c,
            _ => '-',
        };
        if folded == '-' && (slug.is_empty() || slug.ends_with('-')) {
            continue;
        }
        slug.push(folded);
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("property");
    }
    slug
}

/// First of `base`, `base-2`, `base-3`, ... not in `taken`.
pub fn next_free_slug(base: &str, taken: &[String]) -> String {
    if !taken.iter().any(|s| s == base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

async fn unique_slug(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    name: &str,
    exclude: Option<Uuid>,
) -> Result<String, AppError> {
    let base = slugify(name);
    let taken: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT slug FROM properties
        WHERE tenant_id = $1
          AND (slug = $2 OR slug LIKE $2 || '-%')
          AND ($3::uuid IS NULL OR id <> $3)
        "#,
    )
    .bind(tenant_id)
    .bind(&base)
    .bind(exclude)
    .fetch_all(&mut *conn)
    .await?;

    Ok(next_free_slug(&base, &taken))
}

/// Property of `tenant_id`, or `PropertyNotFound`.
pub async fn get_property(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    property_id: Uuid,
) -> Result<Property, AppError> {
    sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE id = $1 AND tenant_id = $2")
        .bind(property_id)
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::PropertyNotFound)
}

/// Like [`get_property`], holding the row lock until the transaction ends.
///
/// Every write that checks booked nights (bookings, blocked periods, iCal
/// imports) takes this lock first, so those checks are serialised per property.
pub async fn lock_property(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    property_id: Uuid,
) -> Result<Property, AppError> {
    sqlx::query_as::<_, Property>(
        "SELECT * FROM properties WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
    )
    .bind(property_id)
    .bind(tenant_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::PropertyNotFound)
}

/// Published property of `tenant_id`, or `PropertyNotFound`.
pub async fn get_published_property(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    property_id: Uuid,
) -> Result<Property, AppError> {
    let property = get_property(conn, tenant_id, property_id).await?;
    if property.status != PropertyStatus::Published {
        return Err(AppError::PropertyNotFound);
    }
    Ok(property)
}

/// Published property by id alone, for feeds fetched without a tenant host.
pub async fn find_published(
    conn: &mut PgConnection,
    property_id: Uuid,
) -> Result<Property, AppError> {
    sqlx::query_as::<_, Property>(
        r#"
        SELECT p.* FROM properties p
        JOIN tenants t ON t.id = p.tenant_id
        WHERE p.id = $1 AND p.status = 'PUBLISHED' AND t.is_active = true
        "#,
    )
    .bind(property_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::PropertyNotFound)
}

pub async fn list_properties(
    conn: &mut PgConnection,
    tenant_id: Uuid,
) -> Result<Vec<Property>, AppError> {
    let properties = sqlx::query_as::<_, Property>(
        "SELECT * FROM properties WHERE tenant_id = $1 ORDER BY created_at DESC",
    )
    .bind(tenant_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(properties)
}

/// Property with its images and the active periods that have not ended yet.
pub async fn property_detail(
    conn: &mut PgConnection,
    property: Property,
    today: NaiveDate,
) -> Result<PropertyDetail, AppError> {
    let images = list_images(conn, property.id).await?;
    let periods = sqlx::query_as::<_, Period>(
        r#"
        SELECT * FROM periods
        WHERE tenant_id = $1
          AND (property_id = $2 OR property_id IS NULL)
          AND is_active = true
          AND end_date >= $3
        ORDER BY start_date
        "#,
    )
    .bind(property.tenant_id)
    .bind(property.id)
    .bind(today)
    .fetch_all(&mut *conn)
    .await?;

    Ok(PropertyDetail {
        property,
        images,
        periods,
    })
}

/// Create a draft property with a slug unique within the tenant.
pub async fn create_property(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    request: CreatePropertyRequest,
) -> Result<Property, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;
    let slug = unique_slug(conn, tenant_id, &request.name, None).await?;

    let property = sqlx::query_as::<_, Property>(
        r#"
        INSERT INTO properties (
            tenant_id, name, slug, property_type, address, city, postal_code, country,
            bedrooms, bathrooms, max_guests, description,
            base_price_cents, weekend_premium_cents, cleaning_fee_cents,
            security_deposit_cents, tourist_tax_cents, min_nights,
            check_in_time, check_out_time, instant_booking, pets_allowed
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
        RETURNING *
        "#,
    )
    .bind(tenant_id)
    .bind(request.name.trim())
    .bind(&slug)
    .bind(request.property_type)
    .bind(request.address.trim())
    .bind(request.city.trim())
    .bind(request.postal_code.trim())
    .bind(request.country.to_ascii_uppercase())
    .bind(request.bedrooms)
    .bind(request.bathrooms)
    .bind(request.max_guests)
    .bind(&request.description)
    .bind(request.base_price_cents)
    .bind(request.weekend_premium_cents)
    .bind(request.cleaning_fee_cents)
    .bind(request.security_deposit_cents)
    .bind(request.tourist_tax_cents)
    .bind(request.min_nights)
    .bind(&request.check_in_time)
    .bind(&request.check_out_time)
    .bind(request.instant_booking)
    .bind(request.pets_allowed)
    .fetch_one(&mut *conn)
    .await
    .map_err(slug_conflict)?;

    tracing::info!(%tenant_id, property_id = %property.id, slug = %property.slug, "Property created");
    Ok(property)
}

fn slug_conflict(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("Slug, subdomain or custom domain already in use".to_string())
    } else {
        err.into()
    }
}

/// `Some("")` clears an optional routing field, `None` keeps it.
fn routing_field(value: Option<String>) -> Option<Option<String>> {
    value
        .map(|v| v.trim().to_ascii_lowercase())
        .map(|v| (!v.is_empty()).then_some(v))
}

/// Check the shape of a property's own subdomain label.
pub fn check_property_subdomain(label: &str) -> Result<(), AppError> {
    subdomain::validate_subdomain(label).map_err(AppError::InvalidRequest)?;
    if subdomain::is_reserved(label) {
        return Err(AppError::InvalidRequest(format!(
            "Subdomain '{label}' is reserved"
        )));
    }
    Ok(())
}

/// An existing use of a subdomain or domain. `owner` is `tenant`,
/// `public_site` or `property`.
#[derive(Debug, sqlx::FromRow)]
pub struct RoutingClaim {
    pub owner: String,
    pub value: String,
}

/// The error for the first existing claim, if any.
pub fn routing_conflict(claims: &[RoutingClaim]) -> Option<AppError> {
    let claim = claims.first()?;
    let holder = match claim.owner.as_str() {
        "tenant" => "a tenant",
        "public_site" => "a booking site",
        _ => "another property",
    };
    Some(AppError::Conflict(format!(
        "'{}' is already used by {holder}",
        claim.value
    )))
}

/// Tenants, booking sites and other properties already routing on the
/// given subdomain or domain.
async fn routing_claims(
    conn: &mut PgConnection,
    property_id: Uuid,
    subdomain: Option<&str>,
    domain: Option<&str>,
) -> Result<Vec<RoutingClaim>, AppError> {
    let claims = sqlx::query_as::<_, RoutingClaim>(
        r#"
        SELECT 'tenant'::text AS owner, subdomain AS value FROM tenants WHERE subdomain = $1::text
        UNION ALL
        SELECT 'public_site', subdomain FROM public_sites WHERE subdomain = $1::text
        UNION ALL
        SELECT 'public_site', domain FROM public_sites WHERE domain = $2::text
        UNION ALL
        SELECT 'property', subdomain FROM properties WHERE subdomain = $1::text AND id <> $3
        UNION ALL
        SELECT 'property', custom_domain FROM properties WHERE custom_domain = $2::text AND id <> $3
        "#,
    )
    .bind(subdomain)
    .bind(domain)
    .bind(property_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(claims)
}

/// Apply a partial update. A new name regenerates the slug.
///
/// A subdomain must be well formed and not reserved; a custom domain must
/// be a hostname outside `base_domain`. Neither may be held by a tenant, a
/// booking site or another property.
pub async fn update_property(
    conn: &mut PgConnection,
    base_domain: &str,
    tenant_id: Uuid,
    property_id: Uuid,
    request: UpdatePropertyRequest,
) -> Result<Property, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;
    let current = get_property(conn, tenant_id, property_id).await?;

    let slug = match &request.name {
        Some(name) if name.trim() != current.name => {
            Some(unique_slug(conn, tenant_id, name, Some(property_id)).await?)
        }
        _ => None,
    };

    let subdomain = routing_field(request.subdomain);
    if let Some(Some(label)) = &subdomain {
        check_property_subdomain(label)?;
    }
    let custom_domain = match request.custom_domain.as_deref() {
        Some(raw) => Some(tenant_service::normalize_custom_domain(raw, base_domain)?),
        None => None,
    };

    let new_subdomain = subdomain.as_ref().and_then(Option::as_deref);
    let new_domain = custom_domain.as_ref().and_then(Option::as_deref);
    if new_subdomain.is_some() || new_domain.is_some() {
        let claims = routing_claims(conn, property_id, new_subdomain, new_domain).await?;
        if let Some(err) = routing_conflict(&claims) {
            return Err(err);
        }
    }

    let property = sqlx::query_as::<_, Property>(
        r#"
        UPDATE properties SET
            name = COALESCE($3, name),
            slug = COALESCE($4, slug),
            property_type = COALESCE($5, property_type),
            status = COALESCE($6, status),
            address = COALESCE($7, address),
            city = COALESCE($8, city),
            postal_code = COALESCE($9, postal_code),
            country = COALESCE($10, country),
            bedrooms = COALESCE($11, bedrooms),
            bathrooms = COALESCE($12, bathrooms),
            max_guests = COALESCE($13, max_guests),
            description = COALESCE($14, description),
            base_price_cents = COALESCE($15, base_price_cents),
            weekend_premium_cents = COALESCE($16, weekend_premium_cents),
            cleaning_fee_cents = COALESCE($17, cleaning_fee_cents),
            security_deposit_cents = COALESCE($18, security_deposit_cents),
            tourist_tax_cents = COALESCE($19, tourist_tax_cents),
            min_nights = COALESCE($20, min_nights),
            check_in_time = COALESCE($21, check_in_time),
            check_out_time = COALESCE($22, check_out_time),
            instant_booking = COALESCE($23, instant_booking),
            pets_allowed = COALESCE($24, pets_allowed),
            subdomain = CASE WHEN $25 THEN $26 ELSE subdomain END,
            custom_domain = CASE WHEN $27 THEN $28 ELSE custom_domain END,
            updated_at = NOW()
        WHERE id = $1 AND tenant_id = $2
        RETURNING *
        "#,
    )
    .bind(property_id)
    .bind(tenant_id)
    .bind(request.name.as_deref().map(str::trim))
    .bind(slug)
    .bind(request.property_type)
    .bind(request.status)
    .bind(request.address)
    .bind(request.city)
    .bind(request.postal_code)
    .bind(request.country.map(|c| c.to_ascii_uppercase()))
    .bind(request.bedrooms)
    .bind(request.bathrooms)
    .bind(request.max_guests)
    .bind(request.description)
    .bind(request.base_price_cents)
    .bind(request.weekend_premium_cents)
    .bind(request.cleaning_fee_cents)
    .bind(request.security_deposit_cents)
    .bind(request.tourist_tax_cents)
    .bind(request.min_nights)
    .bind(request.check_in_time)
    .bind(request.check_out_time)
    .bind(request.instant_booking)
    .bind(request.pets_allowed)
    .bind(subdomain.is_some())
    .bind(subdomain.flatten())
    .bind(custom_domain.is_some())
    .bind(custom_domain.flatten())
    .fetch_one(&mut *conn)
    .await
    .map_err(slug_conflict)?;

    if request.status.is_some_and(|s| s != current.status) {
        tracing::info!(%property_id, status = ?property.status, "Property status changed");
    }
    Ok(property)
}

/// Delete a property that has no live bookings.
pub async fn delete_property(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    property_id: Uuid,
) -> Result<(), AppError> {
    get_property(conn, tenant_id, property_id).await?;

    let live: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bookings WHERE property_id = $1 AND status IN ('PENDING', 'CONFIRMED')",
    )
    .bind(property_id)
    .fetch_one(&mut *conn)
    .await?;
    if live > 0 {
        return Err(AppError::Conflict(format!(
            "Property has {live} active booking(s)"
        )));
    }

    sqlx::query("DELETE FROM properties WHERE id = $1 AND tenant_id = $2")
        .bind(property_id)
        .bind(tenant_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| match e {
            // Finished bookings keep their property
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => AppError::Conflict(
                "Property has past bookings; archive it instead".to_string(),
            ),
            e => e.into(),
        })?;

    tracing::info!(%tenant_id, %property_id, "Property deleted");
    Ok(())
}

pub async fn list_images(
    conn: &mut PgConnection,
    property_id: Uuid,
) -> Result<Vec<PropertyImage>, AppError> {
    let images = sqlx::query_as::<_, PropertyImage>(
        "SELECT * FROM property_images WHERE property_id = $1 ORDER BY position, created_at",
    )
    .bind(property_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(images)
}

/// Register an image URL. A primary image demotes the previous one.
pub async fn add_image(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    property_id: Uuid,
    request: CreateImageRequest,
) -> Result<PropertyImage, AppError> {
    get_property(conn, tenant_id, property_id).await?;
    if url::Url::parse(&request.url).is_err() {
        return Err(AppError::InvalidRequest("Invalid image URL".to_string()));
    }

    if request.is_primary {
        sqlx::query("UPDATE property_images SET is_primary = false WHERE property_id = $1")
            .bind(property_id)
            .execute(&mut *conn)
            .await?;
    }

    let image = sqlx::query_as::<_, PropertyImage>(
        r#"
        INSERT INTO property_images (property_id, url, alt, position, is_primary)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(property_id)
    .bind(&request.url)
    .bind(request.alt)
    .bind(request.position)
    .bind(request.is_primary)
    .fetch_one(&mut *conn)
    .await?;

    Ok(image)
}

pub async fn delete_image(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    property_id: Uuid,
    image_id: Uuid,
) -> Result<(), AppError> {
    get_property(conn, tenant_id, property_id).await?;

    let result = sqlx::query("DELETE FROM property_images WHERE id = $1 AND property_id = $2")
        .bind(image_id)
        .bind(property_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::ImageNotFound);
    }
    Ok(())
}

fn push_public_filters<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    tenant_id: Uuid,
    query: &'a PublicPropertyQuery,
    types: &'a [PropertyType],
) {
    builder
        .push(" WHERE p.tenant_id = ")
        .push_bind(tenant_id)
        .push(" AND p.status = 'PUBLISHED'");

    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        builder
            .push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.city ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description::text ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(city) = query.city.as_deref().filter(|c| !c.trim().is_empty()) {
        builder
            .push(" AND p.city ILIKE ")
            .push_bind(format!("%{}%", city.trim()));
    }
    if let Some(guests) = query.guests {
        builder.push(" AND p.max_guests >= ").push_bind(guests);
    }
    if !types.is_empty() {
        builder.push(" AND p.property_type = ANY(").push_bind(types).push(")");
    }
    if let Some(min) = query.min_price_cents {
        builder.push(" AND p.base_price_cents >= ").push_bind(min);
    }
    if let Some(max) = query.max_price_cents {
        builder.push(" AND p.base_price_cents <= ").push_bind(max);
    }
    if let Some(bedrooms) = query.bedrooms {
        builder.push(" AND p.bedrooms >= ").push_bind(bedrooms);
    }
    if let (Some(check_in), Some(check_out)) = (query.check_in, query.check_out) {
        builder
            .push(
                " AND NOT EXISTS (SELECT 1 FROM bookings b WHERE b.property_id = p.id \
                 AND b.status IN ('PENDING', 'CONFIRMED') AND b.check_in < ",
            )
            .push_bind(check_out)
            .push(" AND b.check_out > ")
            .push_bind(check_in)
            .push(
                ") AND NOT EXISTS (SELECT 1 FROM blocked_periods bp \
                 WHERE bp.property_id = p.id AND bp.start_date < ",
            )
            .push_bind(check_out)
            .push(" AND bp.end_date >= ")
            .push_bind(check_in)
            .push(")");
    }
}

/// Published properties of a tenant matching the public search filters.
pub async fn search_public(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    query: &PublicPropertyQuery,
) -> Result<PublicPropertyList, AppError> {
    query.validate().map_err(AppError::InvalidRequest)?;
    let types = query.property_types().map_err(AppError::InvalidRequest)?;

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM properties p");
    push_public_filters(&mut count, tenant_id, query, &types);
    let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut select = QueryBuilder::<Postgres>::new(
        r#"
        SELECT p.id, p.name, p.slug, p.property_type, p.city, p.country,
               p.bedrooms, p.bathrooms, p.max_guests, p.description,
               p.base_price_cents, p.min_nights, p.instant_booking,
               (SELECT url FROM property_images i
                WHERE i.property_id = p.id
                ORDER BY i.is_primary DESC, i.position LIMIT 1) AS primary_image_url,
               p.created_at
        FROM properties p
        "#,
    );
    push_public_filters(&mut select, tenant_id, query, &types);
    select
        .push(" ORDER BY ")
        .push(query.sort_by.column())
        .push(" ")
        .push(query.sort_order.keyword())
        .push(" LIMIT ")
        .push_bind(query.limit)
        .push(" OFFSET ")
        .push_bind(Pagination::offset(query.page, query.limit));

    let properties = select
        .build_query_as::<PublicPropertySummary>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(PublicPropertyList {
        properties,
        pagination: Pagination::new(query.page, query.limit, total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_folds_accents_and_punctuation() {
        assert_eq!(slugify("Villa Les Pins"), "villa-les-pins");
        assert_eq!(slugify("  Château d'Œuvre / vue mer!  "), "chateau-d-oeuvre-vue-mer");
        assert_eq!(slugify("Appartement n°12"), "appartement-n-12");
        assert_eq!(slugify("!!!"), "property");
    }

    #[test]
    fn next_free_slug_appends_counter() {
        let taken = vec!["villa-les-pins".to_string(), "villa-les-pins-2".to_string()];
        assert_eq!(next_free_slug("villa-les-pins", &taken), "villa-les-pins-3");
        assert_eq!(next_free_slug("mas-provencal", &taken), "mas-provencal");
    }

    #[test]
    fn routing_field_distinguishes_clear_from_keep() {
        assert_eq!(routing_field(None), None);
        assert_eq!(routing_field(Some(" ".into())), Some(None));
        assert_eq!(
            routing_field(Some("Pins".into())),
            Some(Some("pins".to_string()))
        );
    }

    #[test]
    fn property_subdomains_follow_tenant_rules() {
        assert!(check_property_subdomain("les-pins").is_ok());
        assert!(matches!(
            check_property_subdomain("admin"),
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            check_property_subdomain("www"),
            Err(AppError::InvalidRequest(_))
        ));
        assert!(check_property_subdomain("-pins").is_err());
        assert!(check_property_subdomain("ab").is_err());
    }

    #[test]
    fn property_domains_stay_outside_the_platform() {
        assert!(tenant_service::normalize_custom_domain("pins.villa.test", "villa.test").is_err());
        assert_eq!(
            tenant_service::normalize_custom_domain("Les-Pins.fr", "villa.test").unwrap(),
            Some("les-pins.fr".to_string())
        );
    }

    fn claim(owner: &str, value: &str) -> RoutingClaim {
        RoutingClaim {
            owner: owner.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn free_routing_values_have_no_conflict() {
        assert!(routing_conflict(&[]).is_none());
    }

    #[test]
    fn each_existing_holder_is_a_conflict() {
        for (owner, holder) in [
            ("tenant", "a tenant"),
            ("public_site", "a booking site"),
            ("property", "another property"),
        ] {
            match routing_conflict(&[claim(owner, "azur")]) {
                Some(AppError::Conflict(message)) => {
                    assert_eq!(message, format!("'azur' is already used by {holder}"))
                }
                other => panic!("expected a conflict, got {other:?}"),
            }
        }
    }

    #[test]
    fn first_claim_is_reported() {
        let claims = [
            claim("public_site", "www.azur-villas.com"),
            claim("property", "pins"),
        ];
        assert!(matches!(
            routing_conflict(&claims),
            Some(AppError::Conflict(m)) if m.contains("www.azur-villas.com")
        ));
    }
}
