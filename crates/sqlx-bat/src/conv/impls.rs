use crate::{
    DbRepresentable, Error, Result, TryFromDb, TryFromDbImp, TryIntoApp, TryIntoDb, TryIntoDbImp,
};
use std::any::type_name;

impl<A: TryFromDb> TryIntoApp<A> for A::DbRepr {
    fn try_into_app(self) -> Result<A> {
        A::try_from_db(self)
    }
}

impl<A: TryIntoDbImp> TryIntoDb for A {
    fn try_into_db(self) -> Result<Self::DbRepr> {
        let app_val_dbg = format!("{self:#?}");
        self.try_into_db_imp().map_err(|source| Error::Serialize {
            source: Box::new(source),
            app_ty: type_name::<Self>(),
            db_ty: type_name::<Self::DbRepr>(),
            app_val: app_val_dbg,
        })
    }
}

impl<A: TryFromDbImp> TryFromDb for A {
    fn try_from_db(db_val: Self::DbRepr) -> Result<Self> {
        let db_val_dbg = format!("{db_val:#?}");
        Self::try_from_db_imp(db_val).map_err(|source| Error::Deserialize {
            source: Box::new(source),
            app_ty: type_name::<Self>(),
            db_ty: type_name::<Self::DbRepr>(),
            db_val: db_val_dbg,
        })
    }
}

impl<T: DbRepresentable> DbRepresentable for Option<T> {
    type DbRepr = Option<T::DbRepr>;
}

impl<T: TryFromDb> TryFromDb for Option<T> {
    fn try_from_db(val: Self::DbRepr) -> Result<Self> {
        val.map(<_>::try_from_db).transpose()
    }
}

#[macro_export]
macro_rules! impl_try_into_db_via_newtype {
    ($app_ident:ident($app_ty:ty)) => {
        impl $crate::DbRepresentable for $app_ident {
            type DbRepr = <$app_ty as $crate::DbRepresentable>::DbRepr;
        }

        impl $crate::TryIntoDb for $app_ident {
            fn try_into_db(self) -> $crate::Result<Self::DbRepr> {
                $crate::TryIntoDb::try_into_db(self.0)
            }
        }

        impl $crate::TryFromDb for $app_ident {
            fn try_from_db(db_val: Self::DbRepr) -> $crate::Result<Self> {
                $crate::TryFromDb::try_from_db(db_val).map($app_ident)
            }
        }
    };
}

#[macro_export]
macro_rules! impl_try_into_from_db_via_std {
    ($app_ty:ty, $db_ty:ty) => {
        impl $crate::DbRepresentable for $app_ty {
            type DbRepr = $db_ty;
        }

        impl $crate::TryIntoDbImp for $app_ty {
            type Err = <Self as TryInto<Self::DbRepr>>::Error;

            fn try_into_db_imp(self) -> Result<Self::DbRepr, Self::Err> {
                self.try_into()
            }
        }

        impl $crate::TryFromDbImp for $app_ty {
            type Err = <Self as TryFrom<Self::DbRepr>>::Error;

            fn try_from_db_imp(db_val: Self::DbRepr) -> Result<Self, Self::Err> {
                Self::try_from(db_val)
            }
        }
    };
}

macro_rules! impl_identity {
    ($($ty:ty),* $(,)?) => {$(
        impl DbRepresentable for $ty {
            type DbRepr = $ty;
        }

        impl crate::IntoDb for $ty {
            fn into_db(self) -> Self::DbRepr {
                self
            }
        }

        impl TryFromDb for $ty {
            fn try_from_db(val: Self::DbRepr) -> Result<Self> {
                Ok(val)
            }
        }
    )*};
}

impl_identity!(i64, i32, String);

impl_try_into_from_db_via_std!(u64, i64);
impl_try_into_from_db_via_std!(u32, i64);

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn u64_out_of_range_is_a_serialize_error() {
        let err = u64::MAX.try_into_db().unwrap_err();
        assert!(matches!(err, crate::Error::Serialize { .. }), "{err:?}");
    }

    #[test]
    fn negative_i64_is_a_deserialize_error() {
        let err = crate::TryIntoApp::<u64>::try_into_app(-1_i64).unwrap_err();
        assert!(matches!(err, crate::Error::Deserialize { .. }), "{err:?}");
    }
}
