use serde::{Serialize, Deserialize};

/// Vista de solo lectura de un usuario, propiedad del módulo de cuentas.
///
/// The auth subsystem never creates or mutates users; it only needs enough to
/// stamp claims and to confirm the subject of a token still exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: String,
    role: String,
    email: Option<String>,
    phone: Option<String>,
    active: bool,
}

impl User {
    pub fn new(
        id: String,
        role: String,
        email: Option<String>,
        phone: Option<String>,
        active: bool,
    ) -> Self {
        Self {
            id,
            role,
            email,
            phone,
            active,
        }
    }

    // Getters
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Contacto preferido: email, o teléfono si no hay email
    pub fn contact(&self) -> Option<&str> {
        self.email().or(self.phone())
    }
}
