/// A rendered message: subject plus HTML and plain-text bodies.
pub struct Email {
    pub subject: String,
    pub html: String,
    pub text: String,
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body style="font-family: Arial, sans-serif; background-color: #f5f5f5; padding: 24px;">
  <div style="max-width: 560px; margin: 0 auto; background: #ffffff; border-radius: 8px; padding: 32px;">
    <h1 style="color: #0f766e; font-size: 22px;">{title}</h1>
    {body}
    <p style="color: #6b7280; font-size: 12px; margin-top: 32px;">SkillUp Maroc</p>
  </div>
</body>
</html>"#
    )
}

fn button(url: &str, label: &str) -> String {
    format!(
        r#"<p><a href="{url}" style="display: inline-block; background: #0f766e; color: #ffffff; padding: 12px 20px; border-radius: 6px; text-decoration: none;">{label}</a></p>"#
    )
}

/// `12345` minor units as `123.45 MAD`.
pub fn format_amount(amount: i64, currency: &str) -> String {
    format!(
        "{}.{:02} {}",
        amount / 100,
        (amount % 100).abs(),
        currency.to_uppercase()
    )
}

pub fn verification(first_name: &str, url: &str) -> Email {
    let title = "Vérifiez votre adresse email";
    Email {
        subject: title.to_string(),
        html: layout(
            title,
            &format!(
                "<p>Bonjour {first_name},</p><p>Confirmez votre adresse pour activer votre compte. Le lien expire dans 24 heures.</p>{}",
                button(url, "Vérifier mon email")
            ),
        ),
        text: format!(
            "Bonjour {first_name},\n\nConfirmez votre adresse (lien valable 24 heures) :\n{url}\n"
        ),
    }
}

pub fn password_reset(first_name: &str, url: &str) -> Email {
    let title = "Réinitialisation du mot de passe";
    Email {
        subject: title.to_string(),
        html: layout(
            title,
            &format!(
                "<p>Bonjour {first_name},</p><p>Ce lien est valable une heure. Ignorez ce message si vous n'êtes pas à l'origine de la demande.</p>{}",
                button(url, "Choisir un nouveau mot de passe")
            ),
        ),
        text: format!(
            "Bonjour {first_name},\n\nRéinitialisez votre mot de passe (lien valable une heure) :\n{url}\n"
        ),
    }
}

pub fn enrollment(first_name: &str, course_title: &str, url: &str) -> Email {
    let title = format!("Inscription confirmée : {}", course_title);
    Email {
        html: layout(
            &title,
            &format!(
                "<p>Bonjour {first_name},</p><p>Vous avez maintenant accès à <strong>{course_title}</strong>.</p>{}",
                button(url, "Commencer le cours")
            ),
        ),
        text: format!(
            "Bonjour {first_name},\n\nVous avez maintenant accès à {course_title}.\n{url}\n"
        ),
        subject: title,
    }
}

pub fn receipt(
    first_name: &str,
    course_title: &str,
    invoice_number: &str,
    amount: i64,
    currency: &str,
) -> Email {
    let title = format!("Reçu de paiement {}", invoice_number);
    let total = format_amount(amount, currency);
    Email {
        html: layout(
            &title,
            &format!(
                "<p>Bonjour {first_name},</p><p>Merci pour votre achat.</p><p>Cours : {course_title}<br>Facture : {invoice_number}<br>Montant : {total}</p>"
            ),
        ),
        text: format!(
            "Bonjour {first_name},\n\nMerci pour votre achat.\nCours : {course_title}\nFacture : {invoice_number}\nMontant : {total}\n"
        ),
        subject: title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_render_in_major_units() {
        assert_eq!(format_amount(29900, "mad"), "299.00 MAD");
        assert_eq!(format_amount(1205, "MAD"), "12.05 MAD");
    }

    #[test]
    fn links_appear_in_both_bodies() {
        let email = verification("Salma", "https://skillup.ma/verify-email/abc");
        assert!(email.html.contains("https://skillup.ma/verify-email/abc"));
        assert!(email.text.contains("https://skillup.ma/verify-email/abc"));
    }

    #[test]
    fn receipt_mentions_invoice() {
        let email = receipt("Salma", "Rust", "SKM-202503-00001", 19900, "mad");
        assert!(email.subject.contains("SKM-202503-00001"));
        assert!(email.text.contains("199.00 MAD"));
    }
}
